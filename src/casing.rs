//! camelCase / PascalCase conversion for field keys and collection names.
//!
//! Words are split on any non-alphanumeric character, on lower-to-upper
//! transitions (`authorId` → `author`, `Id`) and before the last capital of
//! an acronym run (`fooURLBar` → `foo`, `URL`, `Bar`).

/// Convert to camelCase: `post_type` → `postType`, `Some Field` → `someField`.
pub fn camel_case(input: &str) -> String {
    join_words(&split_words(input), false)
}

/// Convert to PascalCase: `craft entry news` → `CraftEntryNews`.
pub fn pascal_case(input: &str) -> String {
    join_words(&split_words(input), true)
}

fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn join_words(words: &[String], pascal: bool) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 && !pascal {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
