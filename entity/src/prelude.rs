pub use super::email::Entity as Email;
pub use super::email_label::Entity as EmailLabel;
pub use super::finance_record::Entity as FinanceRecord;
pub use super::label::Entity as Label;
pub use super::reminder::Entity as Reminder;
pub use super::todo::Entity as Todo;
