mod address;
mod email;
mod entry;
mod field;
mod im;
mod name;
mod organization;
mod phone;
mod record;
mod relation;

pub use address::PostalAddress;
pub use email::Email;
pub use field::{primary_entry, FieldEntry, FieldGroup};
pub use im::ImHandle;
pub use name::Name;
pub use organization::{join_title, Organization};
pub use phone::Phone;
pub use record::ContactRecord;
pub use relation::{Relation, GOOGLE_NS};
