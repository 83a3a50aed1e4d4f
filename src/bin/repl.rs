use std::panic;
use std::process;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use schemer::Interpreter;
use schemer::builtinops;

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("schemer - an R5RS-subset Scheme interpreter");
    println!("Enter one expression per line, like: (+ 1 2)");
    println!("Definitions persist for the whole session.");
    println!("Type :help for commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("could not initialize line editor");
    let mut interpreter = Interpreter::new();

    loop {
        match rl.readline("schemer> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&interpreter);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match interpreter.run(line) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("schemer commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show global bindings and available builtins");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("The language:");
    println!("  Numbers: 42, -5       Booleans: #t, #f");
    println!("  Lists: (list 1 2 3), (cons 1 2), '(1 2 . 3)");
    println!("  Arithmetic: + - * / abs min max");
    println!("  Comparison: = < > <= >=");
    println!("  Logic: and, or, not   Conditionals: (if c then else)");
    println!("  Binding: (define x 1), (define (f x) body), (set! x 2)");
    println!("  Mutation: (set-car! p v), (set-cdr! p v)");
    println!("  Functions: (lambda (x) (* x x))");
    println!();
    println!("Examples:");
    println!("  (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
    println!("  (fact 5)");
    println!();
}

fn print_environment(interpreter: &Interpreter) {
    // Builtins come from the registry, user values from the global frame.
    let builtins = builtinops::all_ops();
    println!("Built-in operations ({}):", builtins.len());
    let mut col = 0;
    for op in builtins {
        print!("  {:<12}", op.id);
        col += 1;
        if col % 5 == 0 {
            println!();
        }
    }
    if col % 5 != 0 {
        println!();
    }
    println!();

    let bindings = interpreter.global_bindings();
    if bindings.is_empty() {
        println!("No global definitions yet.");
        return;
    }

    println!("Global definitions ({}):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value}");
    }
}
