use vertexdb::{process_query, reset_database};
use std::sync::Mutex;

static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn setup_test<'a>() -> std::sync::MutexGuard<'a, ()> {
    let guard = TEST_MUTEX.lock().unwrap();
    reset_database();
    guard
}

#[test]
fn create_table_rejects_duplicate_name() {
    let _guard = setup_test();
    let result = process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)");
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "Table 'users' created");

    let result = process_query("CREATE TABLE users (id INTEGER, name TEXT)");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("already exists"));
}

#[test]
fn insert_and_select() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    let result = process_query("INSERT INTO users VALUES (1, 'Alice', 25)");
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "1 row(s) inserted");

    process_query("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
    process_query("INSERT INTO users VALUES (3, 'Charlie', 35)").unwrap();

    let result = process_query("SELECT * FROM users").unwrap();
    assert!(result.contains("Alice"));
    assert!(result.contains("Bob"));
    assert!(result.contains("Charlie"));

    let result = process_query("SELECT name, age FROM users").unwrap();
    assert!(result.contains("Alice"));
    assert!(result.contains("25"));
    assert!(!result.contains("id"));
}

#[test]
fn where_clause_with_and_or() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
    process_query("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
    process_query("INSERT INTO users VALUES (3, 'Charlie', 35)").unwrap();

    let result = process_query("SELECT name FROM users WHERE age > 30").unwrap();
    assert!(result.contains("Charlie"));
    assert!(!result.contains("Alice"));
    assert!(!result.contains("Bob"));

    let result = process_query("SELECT name FROM users WHERE age > 20 AND age < 35").unwrap();
    assert!(result.contains("Alice"));
    assert!(result.contains("Bob"));
    assert!(!result.contains("Charlie"));

    let result = process_query("SELECT name FROM users WHERE age = 25 OR age = 35").unwrap();
    assert!(result.contains("Alice"));
    assert!(result.contains("Charlie"));
    assert!(!result.contains("Bob"));
}

#[test]
fn update_statement() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
    process_query("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
    let result = process_query("UPDATE users SET age = 26 WHERE name = 'Alice'");
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "1 row(s) updated");

    let result = process_query("SELECT age FROM users WHERE name = 'Alice'").unwrap();
    assert!(result.contains("26"));
}

#[test]
fn delete_statement() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
    process_query("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
    process_query("INSERT INTO users VALUES (3, 'Charlie', 35)").unwrap();

    let result = process_query("DELETE FROM users WHERE name = 'Bob'");
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "1 row(s) deleted");

    let result = process_query("SELECT * FROM users").unwrap();
    assert!(result.contains("Alice"));
    assert!(!result.contains("Bob"));
    assert!(result.contains("Charlie"));
}

#[test]
fn order_by_asc_and_desc() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Alice', 30)").unwrap();
    process_query("INSERT INTO users VALUES (2, 'Bob', 25)").unwrap();
    process_query("INSERT INTO users VALUES (3, 'Charlie', 35)").unwrap();

    let result = process_query("SELECT name FROM users ORDER BY age ASC").unwrap();
    let lines: Vec<&str> = result.lines().collect();
    let bob_pos = lines.iter().position(|&line| line.contains("Bob")).unwrap();
    let alice_pos = lines.iter().position(|&line| line.contains("Alice")).unwrap();
    assert!(bob_pos < alice_pos);

    let result = process_query("SELECT name FROM users ORDER BY age DESC").unwrap();
    let lines: Vec<&str> = result.lines().collect();
    let charlie_pos = lines.iter().position(|&line| line.contains("Charlie")).unwrap();
    let alice_pos = lines.iter().position(|&line| line.contains("Alice")).unwrap();
    assert!(charlie_pos < alice_pos);
}

#[test]
fn limit_and_offset() {
    let _guard = setup_test();
    process_query("CREATE TABLE users (id INTEGER, name TEXT, age INTEGER)").unwrap();
    process_query("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
    process_query("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
    process_query("INSERT INTO users VALUES (3, 'Charlie', 35)").unwrap();

    let result = process_query("SELECT name FROM users LIMIT 2").unwrap();
    let name_count = result.matches("Alice").count()
        + result.matches("Bob").count()
        + result.matches("Charlie").count();
    assert_eq!(name_count, 2);

    let result = process_query("SELECT name FROM users OFFSET 1").unwrap();
    let name_count = result.matches("Alice").count()
        + result.matches("Bob").count()
        + result.matches("Charlie").count();
    assert_eq!(name_count, 2);
}

#[test]
fn data_types_round_trip() {
    let _guard = setup_test();
    process_query(
        "CREATE TABLE test_types (int_col INTEGER, float_col FLOAT, text_col TEXT, bool_col BOOLEAN)",
    )
    .unwrap();

    let result = process_query("INSERT INTO test_types VALUES (42, 3.14, 'hello', TRUE)");
    assert!(result.is_ok());
    let result = process_query("INSERT INTO test_types VALUES (-10, -2.5, 'world', FALSE)");
    assert!(result.is_ok());

    let result = process_query("SELECT float_col FROM test_types WHERE float_col > 0").unwrap();
    assert!(result.contains("3.14"));
    assert!(!result.contains("-2.5"));
}

#[test]
fn drop_table_rejects_missing_name() {
    let _guard = setup_test();
    process_query("CREATE TABLE temp_table (id INTEGER)").unwrap();

    let result = process_query("DROP TABLE temp_table");
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "Table 'temp_table' dropped");

    let result = process_query("DROP TABLE nonexistent");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("does not exist"));
}

#[test]
fn string_comparison_operators() {
    let _guard = setup_test();
    process_query("CREATE TABLE messages (id INTEGER, content TEXT, author TEXT)").unwrap();
    process_query("INSERT INTO messages VALUES (1, 'Hello World', 'Alice')").unwrap();
    process_query("INSERT INTO messages VALUES (2, 'Goodbye', 'Bob')").unwrap();

    let result = process_query("SELECT content FROM messages WHERE author = 'Alice'").unwrap();
    assert!(result.contains("Hello World"));
    assert!(!result.contains("Goodbye"));

    let result = process_query("SELECT author FROM messages WHERE content != 'Goodbye'").unwrap();
    assert!(result.contains("Alice"));
    assert!(!result.contains("Bob"));
}

#[test]
fn syntax_error_and_missing_table_are_rejected() {
    let _guard = setup_test();
    let result = process_query("SELCT * FROM users");
    assert!(result.is_err());

    let result = process_query("SELECT * FROM nonexistent");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("does not exist"));

    process_query("CREATE TABLE test (a INTEGER, b INTEGER)").unwrap();
    let result = process_query("INSERT INTO test VALUES (1)");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Column count mismatch"));
}
