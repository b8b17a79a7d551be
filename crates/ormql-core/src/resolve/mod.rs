//! Expression resolution: binding, type inference and rendering.

mod arithmetic;
mod constant;
mod literal;
mod render;
mod resolver;

pub use arithmetic::{expected_operand_type, result_type, ArithmeticType};
pub use constant::{discriminator_literal, render_constant};
pub use literal::{classify_numeric, NumericLiteral};
pub use render::ExpressionRenderer;
pub use resolver::{Clause, Resolver};
