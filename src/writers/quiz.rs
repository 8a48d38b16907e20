//! Multiple-choice quizzes as Markdown with a trailing answer key.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::models::QuizItem;

const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

pub fn render_quiz(title: &str, items: &[QuizItem]) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", title.trim());

    for (n, item) in items.iter().enumerate() {
        let _ = writeln!(md, "## Question {}\n", n + 1);
        let _ = writeln!(md, "{}\n", item.question.trim());
        for (letter, choice) in LETTERS.iter().zip(&item.choices) {
            let _ = writeln!(md, "{}) {}", letter, choice.trim());
        }
        md.push('\n');
    }

    md.push_str("## Answer Key\n\n");
    for (n, item) in items.iter().enumerate() {
        let letter = LETTERS.get(item.answer_index).copied().unwrap_or('?');
        let _ = writeln!(md, "{}. {}", n + 1, letter);
    }
    md
}

pub fn write_quiz<P: AsRef<Path>>(path: P, title: &str, items: &[QuizItem]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_quiz(title, items))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let items = vec![QuizItem {
            question: "Which scheduler is preemptive?".into(),
            choices: ["FCFS".into(), "Round robin".into(), "SJF".into(), "None".into()],
            answer_index: 1,
        }];
        let md = render_quiz("OS Quiz", &items);
        assert!(md.starts_with("# OS Quiz\n\n## Question 1\n\nWhich scheduler is preemptive?\n\nA) FCFS\nB) Round robin\n"));
        assert!(md.ends_with("## Answer Key\n\n1. B\n"));
    }
}
