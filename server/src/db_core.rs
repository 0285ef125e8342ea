pub mod prelude {
    pub use entity::prelude::*;
    pub use entity::{email, email_label, finance_record, label, reminder, todo};
    pub use sea_orm::{
        entity::*, query::*, ActiveValue, DatabaseConnection, DbErr,
        prelude::{Date, DateTimeWithTimeZone},
    };
}
