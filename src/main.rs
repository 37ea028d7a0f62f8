use schemamd::compile;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <schema.mmd>", args[0]);
        eprintln!();
        eprintln!("Compiles the schema source and writes a sibling .yaml file.");
        process::exit(1);
    }

    let input_path = &args[1];

    let source = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let document = match compile(&source) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Compile error: {}", e);
            process::exit(1);
        }
    };

    let yaml = match serde_yaml::to_string(&document) {
        Ok(y) => y,
        Err(e) => {
            eprintln!("Failed to serialize schema: {}", e);
            process::exit(1);
        }
    };

    let output_path = Path::new(input_path).with_extension("yaml");
    if let Err(e) = fs::write(&output_path, yaml) {
        eprintln!("Failed to write {}: {}", output_path.display(), e);
        process::exit(1);
    }

    println!(
        "Compiled {} entities -> {}",
        document.entities.len(),
        output_path.display()
    );
}
