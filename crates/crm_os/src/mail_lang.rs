#![forbid(unsafe_code)]

//! English mail strings for reminder and stay-in-touch notifications.
//!
//! Placeholders use the `:name` form. `render` also honours `:NAME` (value
//! upper-cased) and `:Name` (first letter upper-cased).

const EN_LINES: &[(&str, &str)] = &[
    ("subject_line", "Reminder for :contact"),
    ("greetings", "Hi :username"),
    ("want_reminded_of", "YOU WANTED TO BE REMINDED OF"),
    ("for", "FOR:"),
    (
        "footer_contact_info",
        "Add, view, complete, and change information about this contact:",
    ),
    ("notification_subject_line", "You have an upcoming event"),
    (
        "notification_description",
        "In :count days (on :date), the following event will happen:",
    ),
    ("stay_in_touch_subject_line", "Stay in touch with :name"),
    (
        "stay_in_touch_subject_description",
        "You asked to be reminded to stay in touch with :name every :frequency days.",
    ),
];

pub fn keys() -> impl Iterator<Item = &'static str> {
    EN_LINES.iter().map(|(k, _)| *k)
}

pub fn line(key: &str) -> Option<&'static str> {
    EN_LINES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Resolves `key` and substitutes `params`. Returns `None` for unknown keys.
pub fn render(key: &str, params: &[(&str, &str)]) -> Option<String> {
    line(key).map(|template| substitute(template, params))
}

pub fn substitute(template: &str, params: &[(&str, &str)]) -> String {
    // Longest names first so `:contact` cannot eat the prefix of `:contacts`.
    let mut ordered: Vec<&(&str, &str)> = params.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = template.to_string();
    for (name, value) in ordered {
        if name.is_empty() {
            continue;
        }
        out = out.replace(&format!(":{}", upper_first(name)), &upper_first(value));
        out = out.replace(&format!(":{}", name.to_uppercase()), &value.to_uppercase());
        out = out.replace(&format!(":{name}"), value);
    }
    out
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
