use vertexdb::{process_query, reset_database};

#[test]
fn alter_table_add_column() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER)").unwrap();

    let result = process_query("ALTER TABLE users ADD COLUMN name TEXT").unwrap();
    assert!(result.contains("Column 'name' added"));

    process_query("INSERT INTO users VALUES (1, 'Ada')").unwrap();
    let out = process_query("SELECT * FROM users").unwrap();
    assert!(out.contains("Ada"));
}

#[test]
fn alter_table_rename_column() {
    reset_database();
    process_query("CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Ada')").unwrap();

    let result = process_query("ALTER TABLE users RENAME COLUMN name TO full_name").unwrap();
    assert!(result.contains("renamed"));

    let out = process_query("SELECT full_name FROM users").unwrap();
    assert!(out.contains("Ada"));
}
