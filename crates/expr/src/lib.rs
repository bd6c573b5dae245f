
use common::{DbError, DbResult, Record, Schema};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree evaluated over a single record.
///
/// Attributes are referenced by ordinal, matching the schema the record was
/// laid out under.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    Attr(usize),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

/// Evaluation context consisting of the record's schema.
pub struct EvalContext<'a> {
    pub schema: &'a Schema,
}

impl<'a> EvalContext<'a> {
    /// Evaluate an expression over a given record.
    pub fn eval(&self, expr: &Expr, record: &Record) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Attr(idx) => record.get_attr(self.schema, *idx),
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, record)?;
                match op {
                    UnaryOp::Not => {
                        let b = v
                            .as_bool()
                            .ok_or_else(|| DbError::Expr(format!("NOT expects bool, got {v:?}")))?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, record)?;
                let rv = self.eval(right, record)?;
                eval_binary(&lv, *op, &rv)
            }
        }
    }
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> DbResult<Value> {
    use BinaryOp::*;

    if let And | Or = op {
        let lb = l
            .as_bool()
            .ok_or_else(|| DbError::Expr(format!("AND/OR expects bools, got {l:?}")))?;
        let rb = r
            .as_bool()
            .ok_or_else(|| DbError::Expr(format!("AND/OR expects bools, got {r:?}")))?;
        return Ok(Value::Bool(match op {
            And => lb && rb,
            Or => lb || rb,
            _ => unreachable!(),
        }));
    }

    let ord = l
        .cmp_same_type(r)
        .ok_or_else(|| DbError::Expr(format!("incompatible types for {op:?}: {l:?}, {r:?}")))?;

    let result = match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
        _ => unreachable!(),
    };

    Ok(Value::Bool(result))
}
