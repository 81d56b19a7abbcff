//! Prompt templates for the tutoring features.

pub const QA_SYSTEM_PROMPT: &str = "You are an expert programming tutor with deep knowledge of multiple programming languages and frameworks.
Your role is to:
- Provide clear, accurate, and helpful answers to programming questions
- Use the provided documentation context when available
- Explain concepts in a way appropriate for the user's skill level
- Include practical examples when helpful
- Cite sources when referencing specific documentation
- Be encouraging and supportive";

pub const EXAMPLES_REQUEST: &str = "\n\nPlease include practical code examples in your answer.";

/// Question prompt with the retrieved passages numbered `[1]`, `[2]`, ...
pub fn build_qa_prompt(question: &str, context: &[String], language: &str, level: &str) -> String {
    let context_str = context
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Programming Language: {language}
User Level: {level}

Context from Documentation:
{context_str}

Question: {question}

Please provide a comprehensive answer that:
1. Directly addresses the question
2. Uses information from the provided context when relevant
3. Is appropriate for a {level} level programmer
4. Includes practical examples if helpful
5. Cites the context sources using [1], [2], etc.
"
    )
}

pub fn related_questions_prompt(question: &str, n_questions: usize) -> String {
    format!(
        "Given this programming question: \"{question}\"

Generate {n_questions} related questions that a learner might want to ask next.
These should be:
- Slightly different in scope or depth
- Related to the same topic
- Progressively more advanced

Return only the questions, numbered 1-{n_questions}."
    )
}

pub fn explain_concept_prompt(concept: &str, language: &str, level: &str) -> String {
    format!(
        "Explain the concept of \"{concept}\" in {language} programming for a {level} level programmer.

Your explanation should include:
1. A clear definition
2. Why it's important
3. How it works
4. Practical examples
5. Common use cases
6. Common pitfalls or mistakes

Make it engaging and easy to understand."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_prompt_numbers_every_passage() {
        let context = vec!["Lists are ordered.".to_string(), "Tuples are immutable.".to_string()];
        let prompt = build_qa_prompt("List vs tuple?", &context, "Python", "Beginner");

        assert!(prompt.starts_with("Programming Language: Python\nUser Level: Beginner"));
        assert!(prompt.contains("[1] Lists are ordered.\n\n[2] Tuples are immutable."));
        assert!(prompt.contains("Question: List vs tuple?"));
        assert!(prompt.contains("appropriate for a Beginner level programmer"));
    }

    #[test]
    fn related_prompt_asks_for_a_numbered_list() {
        let prompt = related_questions_prompt("What is a decorator?", 4);
        assert!(prompt.contains("Generate 4 related questions"));
        assert!(prompt.ends_with("numbered 1-4."));
    }
}
