/// Binary operators of the typed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    /// Equal (`==`, `=`, `eq`)
    Equal,
    /// Not equal (`!=`, `<>`, `ne`)
    NotEqual,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessThanOrEqual,
    /// Greater than or equal (`>=`)
    GreaterThanOrEqual,

    // Arithmetic
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Remainder (`%`, `mod`)
    Modulo,

    // Bitwise
    /// Bitwise and (`&` on integers)
    And,
    /// Bitwise or (`|`)
    Or,
    /// Left shift (`<<`)
    LeftShift,
    /// Right shift (`>>`)
    RightShift,

    // Logical
    /// Short-circuit and (`&&`, `and`)
    AndAlso,
    /// Short-circuit or (`||`, `or`)
    OrElse,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThanOrEqual
        )
    }

    /// Name of the user-declared operator method implementing this operator.
    pub fn operator_method_name(self) -> &'static str {
        match self {
            BinaryOp::Equal => "op_Equality",
            BinaryOp::NotEqual => "op_Inequality",
            BinaryOp::LessThan => "op_LessThan",
            BinaryOp::GreaterThan => "op_GreaterThan",
            BinaryOp::LessThanOrEqual => "op_LessThanOrEqual",
            BinaryOp::GreaterThanOrEqual => "op_GreaterThanOrEqual",
            BinaryOp::Add => "op_Addition",
            BinaryOp::Subtract => "op_Subtraction",
            BinaryOp::Multiply => "op_Multiply",
            BinaryOp::Divide => "op_Division",
            BinaryOp::Modulo => "op_Modulus",
            BinaryOp::And | BinaryOp::AndAlso => "op_BitwiseAnd",
            BinaryOp::Or | BinaryOp::OrElse => "op_BitwiseOr",
            BinaryOp::LeftShift => "op_LeftShift",
            BinaryOp::RightShift => "op_RightShift",
        }
    }
}

/// Unary operators of the typed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (`-`)
    Negate,
    /// Logical not (`!`, `not`)
    Not,
    /// Conversion to the node's type, inserted by implicit promotion or an
    /// explicit `Type(expr)` conversion
    Convert,
}
