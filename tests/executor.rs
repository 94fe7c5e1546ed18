use vertexdb::{process_query, reset_database};

#[test]
fn null_values_render_as_null_in_select_output() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER, nickname TEXT)").unwrap();
    process_query("INSERT INTO users (id) VALUES (1)").unwrap();
    let out = process_query("SELECT nickname FROM users").unwrap();
    assert!(out.contains("NULL"));
}

#[test]
fn create_table_is_queryable_immediately() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
    let out = process_query("SELECT * FROM users").unwrap();
    assert!(out.contains("id"));
    assert!(out.contains("name"));
}
