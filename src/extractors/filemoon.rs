//! Extractor for FileMoon-family player pages.
//!
//! These pages hide the player config behind Dean Edwards' p.a.c.k.e.r:
//! an `eval(function(p,a,c,k,e,d){...})` call whose payload swaps dictionary
//! words back in by base-N token. Unpacking is a single substitution pass,
//! after which the stream URL sits in a plain `file:"..."` attribute.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};

use crate::errors::ScraperError;
use crate::models::{ExtractedLink, LinkKind};
use crate::net::{Endpoint, RequestEngine};

use super::Extractor;

const DOMAINS: [&str; 3] = ["filemoon", "moonplayer", "kerapoxy"];

fn packed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)eval\(function\(p,a,c,k,e,d\).*?\}\('(?P<p>.*?)',(?P<a>\d+),(?P<c>\d+),'(?P<k>[^']*)'\.split\('\|'\)",
        )
        .expect("Invalid regex")
    })
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("Invalid regex"))
}

fn file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"file\s*:\s*"(https?://[^"]+)""#).expect("Invalid regex"))
}

/// Reverses the packer substitution: every token that parses as a base-`radix`
/// index into `words` is replaced with the dictionary word, empty dictionary
/// slots keep the token itself.
fn unpack(payload: &str, radix: u32, count: usize, words: &[&str]) -> String {
    token_regex()
        .replace_all(payload, |caps: &Captures| {
            let token = &caps[0];
            match usize::from_str_radix(token, radix) {
                Ok(index) if index < count => {
                    let word = words.get(index).copied().unwrap_or("");
                    if word.is_empty() {
                        token.to_string()
                    } else {
                        word.to_string()
                    }
                }
                _ => token.to_string(),
            }
        })
        .into_owned()
}

fn unpack_page(page: &str) -> Result<String, ScraperError> {
    let caps = packed_regex().captures(page).ok_or_else(|| {
        ScraperError::ExtractionFailed("no packed player script found".to_string())
    })?;

    let radix: u32 = caps["a"]
        .parse()
        .map_err(|_| ScraperError::ExtractionFailed("bad packer radix".to_string()))?;
    if !(2..=36).contains(&radix) {
        return Err(ScraperError::ExtractionFailed(format!(
            "unsupported packer radix: {radix}"
        )));
    }

    let count: usize = caps["c"]
        .parse()
        .map_err(|_| ScraperError::ExtractionFailed("bad packer word count".to_string()))?;

    let payload = caps["p"].replace("\\'", "'").replace("\\\\", "\\");
    let dictionary: Vec<&str> = caps.name("k").map_or("", |m| m.as_str()).split('|').collect();

    Ok(unpack(&payload, radix, count, &dictionary))
}

fn parse_player_page(page: &str, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
    let unpacked = unpack_page(page)?;

    let file = file_regex()
        .captures(&unpacked)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            ScraperError::ExtractionFailed("no file URL in unpacked script".to_string())
        })?;

    let kind = if file.contains(".m3u8") {
        LinkKind::Hls
    } else {
        LinkKind::Direct
    };

    Ok(vec![
        ExtractedLink::new(file, kind)
            .with_server("FileMoon")
            .with_referer(embed_url),
    ])
}

pub struct FileMoonExtractor {
    engine: RequestEngine,
}

impl FileMoonExtractor {
    #[must_use]
    pub const fn new(engine: RequestEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Extractor for FileMoonExtractor {
    fn name(&self) -> &'static str {
        "filemoon"
    }

    fn supported_domains(&self) -> &[&'static str] {
        &DOMAINS
    }

    async fn extract(&self, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
        let page = self
            .engine
            .execute(&Endpoint::get(embed_url, "").with_header("Referer", embed_url))
            .await?;

        parse_player_page(&page, embed_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_substitutes_dictionary_words() {
        let result = unpack(r#"0.1('2')"#, 10, 3, &["player", "setup", "stream"]);
        assert_eq!(result, "player.setup('stream')");
    }

    #[test]
    fn unpack_keeps_unknown_and_empty_tokens() {
        let result = unpack("0 keep 9", 10, 2, &["hello", ""]);
        // token 9 is out of range, the empty slot at 1 never fires.
        assert_eq!(result, "hello keep 9");
    }

    const PACKED_PAGE: &str = concat!(
        r"<script>eval(function(p,a,c,k,e,d){e=function(c){return c};",
        r"while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}",
        r#"return p}('player.setup({file:"0",type:"hls"})',36,1,"#,
        r"'https://cdn.fm.example/hls/master.m3u8'.split('|')))</script>",
    );

    #[test]
    fn unpacks_real_shaped_page_and_finds_stream() {
        let links = parse_player_page(PACKED_PAGE, "https://filemoon.example/e/q").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://cdn.fm.example/hls/master.m3u8");
        assert_eq!(links[0].kind, LinkKind::Hls);
        assert_eq!(links[0].server.as_deref(), Some("FileMoon"));
    }

    #[test]
    fn page_without_packed_script_fails() {
        let err = parse_player_page("<html>plain</html>", "https://x.example").unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[test]
    fn unpacked_script_without_file_fails() {
        let page = concat!(
            r"eval(function(p,a,c,k,e,d){}('nothing 0 here',36,1,",
            r"'word'.split('|')))",
        );
        let err = parse_player_page(page, "https://x.example").unwrap_err();
        assert!(err.to_string().contains("no file URL"));
    }
}
