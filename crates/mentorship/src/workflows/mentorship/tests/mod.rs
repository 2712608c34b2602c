mod common;
mod lifecycle;
mod sqlite;
