//! Starter documentation and document files for `codementor init`.

use std::path::Path;

use crate::core::errors::{RagError, Result};
use crate::rag::{Document, Metadata};

pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            r#"Python Functions: A function is a block of reusable code. Use 'def' keyword to define functions.

Example:
def greet(name):
    return f"Hello, {name}!"

Functions can have parameters, default values, and return statements."#,
            Metadata::new()
                .with_title("Python Functions")
                .with_language("Python")
                .with_type("tutorial"),
        ),
        Document::new(
            r#"Python Lists: Lists are ordered, mutable collections. Created using square brackets [].

Common operations:
- append(x): Add item
- remove(x): Remove item
- sort(): Sort list
- len(): Get length

Example:
fruits = ['apple', 'banana']
fruits.append('cherry')"#,
            Metadata::new()
                .with_title("Python Lists")
                .with_language("Python")
                .with_type("reference"),
        ),
        Document::new(
            r#"Python Exception Handling: Use try-except blocks to handle errors gracefully.

Syntax:
try:
    result = 10 / 0
except ZeroDivisionError:
    print("Cannot divide by zero!")
except Exception as e:
    print(f"Error: {e}")
finally:
    print("Cleanup")

Common exceptions: ValueError, TypeError, KeyError, IndexError"#,
            Metadata::new()
                .with_title("Python Exceptions")
                .with_language("Python")
                .with_type("tutorial"),
        ),
        Document::new(
            r#"Python Classes: Object-oriented programming in Python.

Example:
class Dog:
    def __init__(self, name):
        self.name = name

    def bark(self):
        return f"{self.name} says Woof!"

dog = Dog("Buddy")
print(dog.bark())

Key OOP concepts: Encapsulation, Inheritance, Polymorphism"#,
            Metadata::new()
                .with_title("Python Classes")
                .with_language("Python")
                .with_type("tutorial"),
        ),
        Document::new(
            r#"JavaScript Promises: Handle asynchronous operations.

Example:
const promise = new Promise((resolve, reject) => {
    setTimeout(() => resolve("Success!"), 1000);
});

promise.then(result => console.log(result))
       .catch(error => console.error(error));

Modern syntax: async/await"#,
            Metadata::new()
                .with_title("JavaScript Promises")
                .with_language("JavaScript")
                .with_type("tutorial"),
        ),
    ]
}

/// Reads `{text, metadata}` records from a JSON array or a JSON-lines file.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RagError::BadRequest(format!("cannot read {}: {}", path.display(), e)))?;
    parse_documents(&raw)
        .map_err(|e| RagError::Parse(format!("{}: {}", path.display(), e)))
}

fn parse_documents(raw: &str) -> std::result::Result<Vec<Document>, serde_json::Error> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw);
    }
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn samples_cover_two_languages() {
        let docs = sample_documents();
        assert_eq!(docs.len(), 5);
        assert!(docs.iter().all(|d| d.metadata.title.is_some()));
        assert_eq!(
            docs.iter()
                .filter(|d| d.metadata.language.as_deref() == Some("JavaScript"))
                .count(),
            1
        );
    }

    #[test]
    fn loads_json_array_and_json_lines() {
        let mut array = tempfile::NamedTempFile::new().unwrap();
        write!(
            array,
            r#"[{{"text": "Rust traits", "metadata": {{"title": "Traits", "language": "Rust"}}}}]"#
        )
        .unwrap();
        let docs = load_documents(array.path()).unwrap();
        assert_eq!(docs[0].metadata.title.as_deref(), Some("Traits"));

        let mut lines = tempfile::NamedTempFile::new().unwrap();
        writeln!(lines, r#"{{"text": "one"}}"#).unwrap();
        writeln!(lines).unwrap();
        writeln!(lines, r#"{{"text": "two", "metadata": {{"difficulty": 2}}}}"#).unwrap();
        let docs = load_documents(lines.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata, Metadata::default());
    }

    #[test]
    fn malformed_files_are_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_documents(file.path()), Err(RagError::Parse(_))));
    }
}
