//! UI module - standalone widgets shared by both screens

pub mod components;
