use regex::Regex;

const BULLET: char = '\u{2022}';
const MIN_BULLETS: usize = 3;

/// Mask an email for display: keep the first two characters and the
/// `@domain` tail, replace everything in between with at least three bullets.
///
/// The bullet count is the hidden part's length in UTF-16 code units, so a
/// character outside the Basic Multilingual Plane hides behind two bullets.
///
/// Input that does not have two characters before its last `@` is returned
/// unchanged.
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Ok(re) = Regex::new(r"(.{2})(.*)(@.*)") else {
        return email.to_string();
    };

    re.replace(email, |caps: &regex::Captures<'_>| {
        let hidden = caps[2].encode_utf16().count().max(MIN_BULLETS);
        let bullets: String = std::iter::repeat(BULLET).take(hidden).collect();
        format!("{}{}{}", &caps[1], bullets, &caps[3])
    })
    .into_owned()
}
