use std::rc::Rc;

use itertools::Itertools;

use crate::frontend::ast::TypeAnnotationKind;

/// Structural type of a value or function. Function types compare by
/// shape, so two functions with the same parameter and return types are
/// interchangeable at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Nil,
    Function {
        parameters: Rc<[Type]>,
        return_type: Rc<Type>,
    },
}

impl Type {
    pub fn from_annotation(kind: TypeAnnotationKind) -> Self {
        match kind {
            TypeAnnotationKind::Int => Type::Int,
            TypeAnnotationKind::Bool => Type::Bool,
            TypeAnnotationKind::Nil => Type::Nil,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Nil => write!(f, "nil"),
            Self::Function {
                parameters,
                return_type,
            } => {
                write!(
                    f,
                    "({}) -> {}",
                    parameters.iter().map(|ty| ty.to_string()).join(", "),
                    return_type
                )
            }
        }
    }
}
