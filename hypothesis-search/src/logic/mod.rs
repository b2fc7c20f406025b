//! The first-order vocabulary shared by every other module: arguments
//! and placeholders, atoms and literals, rules, programs, and the
//! canonical handles that identify rules up to renaming.
mod argument;
mod handle;
mod literal;
mod rule;

pub use argument::Argument;
pub use argument::Placeholder;
pub use argument::RuleVar;
pub use argument::Symbol;
pub use argument::Var;
pub use argument::VarVar;
pub use handle::Handle;
pub use handle::HandleCache;
pub use literal::Atom;
pub use literal::Bound;
pub use literal::Literal;
pub use rule::Program;
pub use rule::Rule;
pub use rule::RuleOrdering;
