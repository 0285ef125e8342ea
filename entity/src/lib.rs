pub mod prelude;

pub mod email;
pub mod email_label;
pub mod finance_record;
pub mod label;
pub mod reminder;
pub mod todo;
