pub mod health;
pub mod onebot;
