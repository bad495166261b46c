//! Bulk member list parsing
//!
//! Admins paste member lists as text, one name per line. Lines of the form
//! `Junior: Alice` keep only the part after the first colon.

/// Parse a pasted member list into unique, trimmed names in input order
#[must_use]
pub fn parse_member_list(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let name = match line.split_once(':') {
            Some((_, rest)) => rest.trim(),
            None => line,
        };
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed_lines() {
        let text = "Alice\n  \nJunior: Bob\nAlice\nSenior:   Cara  \n:\n";
        assert_eq!(parse_member_list(text), vec!["Alice", "Bob", "Cara"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_member_list("   \n\n").is_empty());
    }
}
