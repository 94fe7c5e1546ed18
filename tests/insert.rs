use vertexdb::{process_query, reset_database};

#[test]
fn insert_with_explicit_column_list() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER, name TEXT)").unwrap();

    let result = process_query("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();
    assert_eq!(result, "1 row(s) inserted");

    let out = process_query("SELECT * FROM users").unwrap();
    assert!(out.contains("Alice"));
}

#[test]
fn insert_with_mismatched_column_count_is_an_error() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
    assert!(process_query("INSERT INTO users VALUES (1)").is_err());
}
