// Pure transforms: schema typing, dimension extraction, normalization, and resolution

pub mod catalog;
pub mod normalize;
pub mod ordering;
pub mod schema;
pub mod songplays;
pub mod time;
pub mod users;
