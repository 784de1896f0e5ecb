pub mod rest;
pub mod socketio;
pub mod types;
pub mod ws;
