pub mod arn;
pub mod handles;
pub mod task_definition;

pub use arn::{Arn, ArnError, TaskDefinitionRef};
pub use handles::*;
pub use task_definition::*;
