use vertexdb::{process_query, reset_database};
use std::sync::Mutex;

static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn setup_test<'a>() -> std::sync::MutexGuard<'a, ()> {
    let guard = TEST_MUTEX.lock().unwrap();
    reset_database();
    guard
}

#[test]
fn unique_index_rejects_duplicate_values() {
    let _guard = setup_test();

    process_query("CREATE TABLE users (id INTEGER, email TEXT, name TEXT)").unwrap();
    process_query("CREATE UNIQUE INDEX idx_email ON users (email)").unwrap();

    let result = process_query("INSERT INTO users VALUES (1, 'alice@example.com', 'Alice')");
    assert!(result.is_ok());

    let result = process_query("INSERT INTO users VALUES (2, 'alice@example.com', 'Bob')");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("already has key mapped"));

    let result = process_query("INSERT INTO users VALUES (3, 'bob@example.com', 'Bob')");
    assert!(result.is_ok());
}

#[test]
fn unique_index_rejects_duplicate_on_update() {
    let _guard = setup_test();

    process_query("CREATE TABLE users (id INTEGER, email TEXT, name TEXT)").unwrap();
    process_query("CREATE UNIQUE INDEX idx_email ON users (email)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'alice@example.com', 'Alice')").unwrap();
    process_query("INSERT INTO users VALUES (2, 'bob@example.com', 'Bob')").unwrap();

    let result = process_query("UPDATE users SET email = 'alice@example.com' WHERE id = 2");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("already has key mapped"));

    let result = process_query("UPDATE users SET email = 'charlie@example.com' WHERE id = 2");
    assert!(result.is_ok());

    let result_str = process_query("SELECT name FROM users WHERE email = 'charlie@example.com'").unwrap();
    assert!(result_str.contains("Bob"));
}

#[test]
fn unique_index_does_not_apply_to_non_indexed_columns() {
    let _guard = setup_test();

    process_query("CREATE TABLE users (id INTEGER, email TEXT, name TEXT)").unwrap();
    process_query("CREATE UNIQUE INDEX idx_email ON users (email)").unwrap();

    process_query("INSERT INTO users VALUES (1, 'alice@example.com', 'Alice')").unwrap();
    let result = process_query("INSERT INTO users VALUES (2, 'bob@example.com', 'Alice')");
    assert!(result.is_ok());
}
