pub mod booking;
pub mod driver;
pub mod promo;
