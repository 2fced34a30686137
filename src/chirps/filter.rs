const BLOCKLIST: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];
const MASK: &str = "****";
const SEP: &str = " ";

fn is_profane(word: &str) -> bool {
    let lowered = word.to_lowercase();
    BLOCKLIST.iter().any(|w| *w == lowered)
}

/// Masks blocklisted words. Only whole space-separated tokens match, so
/// `"kerfuffle!"` and `"kerfufflebutt"` pass through untouched.
pub fn filter_body(body: &str) -> String {
    body.split(SEP)
        .map(|word| if is_profane(word) { MASK } else { word })
        .collect::<Vec<_>>()
        .join(SEP)
}
