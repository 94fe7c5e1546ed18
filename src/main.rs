use std::io::{self, IsTerminal, Write};

use vertexdb::process_query;

fn main() {
    if io::stdin().is_terminal() {
        println!("vertexdb - SQL over a paged red-black tree index core");
        println!("Type 'exit' to quit\n");

        loop {
            print!("vertexdb> ");
            io::stdout().flush().unwrap();

            let mut input = String::new();
            if io::stdin().read_line(&mut input).unwrap() == 0 {
                break;
            }

            let query = input.trim();

            if query.eq_ignore_ascii_case("exit") {
                println!("Goodbye!");
                break;
            }

            if query.is_empty() {
                continue;
            }

            match process_query(query) {
                Ok(result) => println!("{}", result),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    } else {
        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap();
        let query = input.trim();

        if !query.is_empty() {
            match process_query(query) {
                Ok(result) => println!("{}", result),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }
}
