use std::cmp::Ordering;

/// One token of a version string, following the rules of Maven's `ComparableVersion` closely
///  enough for ordering repository metadata
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(String), // digits without leading zeros
    Qualifier(String),
}

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_QUALIFIER_INDEX: usize = 5;

fn normalize_qualifier(q: &str) -> &str {
    match q {
        "a" => "alpha",
        "b" => "beta",
        "m" => "milestone",
        "cr" => "rc",
        "ga" | "final" | "release" => "",
        other => other,
    }
}

fn qualifier_rank(q: &str) -> (usize, &str) {
    match QUALIFIERS.iter().position(|known| *known == q) {
        Some(idx) => (idx, ""),
        None => (QUALIFIERS.len(), q),
    }
}

fn tokenize(version: &str) -> Vec<Item> {
    let version = version.to_ascii_lowercase();
    let mut items = Vec::new();

    for part in version.split(['.', '-']) {
        let mut current = String::new();
        let mut current_is_digit = None;
        for c in part.chars() {
            let is_digit = c.is_ascii_digit();
            if current_is_digit.is_some() && current_is_digit != Some(is_digit) {
                items.push(make_item(&current));
                current.clear();
            }
            current.push(c);
            current_is_digit = Some(is_digit);
        }
        items.push(make_item(&current));
    }

    // trailing "null" items do not make a version bigger: 1.0 == 1 == 1-ga
    while let Some(last) = items.last() {
        if is_null(last) {
            items.pop();
        }
        else {
            break;
        }
    }
    items
}

fn make_item(token: &str) -> Item {
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = token.trim_start_matches('0');
        Item::Number(trimmed.to_string())
    }
    else {
        Item::Qualifier(normalize_qualifier(token).to_string())
    }
}

fn is_null(item: &Item) -> bool {
    match item {
        Item::Number(n) => n.is_empty(),
        Item::Qualifier(q) => q.is_empty(),
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a).cmp(&qualifier_rank(b))
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Item::Number(a)), Some(Item::Number(b))) => compare_numbers(a, b),
        (Some(Item::Qualifier(a)), Some(Item::Qualifier(b))) => compare_qualifiers(a, b),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Number(a)), None) => compare_numbers(a, ""),
        (None, Some(Item::Number(b))) => compare_numbers("", b),
        (Some(Item::Qualifier(a)), None) => qualifier_rank(a).cmp(&(RELEASE_QUALIFIER_INDEX, "")),
        (None, Some(Item::Qualifier(b))) => (RELEASE_QUALIFIER_INDEX, "").cmp(&qualifier_rank(b)),
    }
}

/// Version-aware comparison of two Maven version strings, e.g. `1.10 > 1.9`,
///  `1.0-alpha-1 < 1.0-beta < 1.0-rc1 < 1.0-SNAPSHOT < 1.0 < 1.0-sp1`
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = tokenize(a);
    let b = tokenize(b);
    for i in 0..a.len().max(b.len()) {
        let result = compare_items(a.get(i), b.get(i));
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}
