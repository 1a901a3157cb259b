//! HTML to markdown conversion.

use htmd::HtmlToMarkdown;

/// Convert rendered HTML into markdown, dropping chrome that carries no
/// content (scripts, navigation, footers).
pub fn to_markdown(html: &str) -> String {
	let converter = HtmlToMarkdown::builder()
		.skip_tags(vec![
			"script", "style", "nav", "footer", "header", "aside", "noscript", "iframe",
		])
		.build();
	match converter.convert(html) {
		Ok(md) => normalize(&md),
		Err(_) => String::new(),
	}
}

/// Collapse runs of more than two blank lines.
fn normalize(md: &str) -> String {
	let mut out = String::with_capacity(md.len());
	let mut blank = 0usize;
	for line in md.lines() {
		if line.trim().is_empty() {
			blank += 1;
			if blank > 2 {
				continue;
			}
		} else {
			blank = 0;
		}
		out.push_str(line);
		out.push('\n');
	}
	out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn converts_headings_and_links() {
		let html = r#"<h1>Title</h1><p>See <a href="https://example.com/">example</a>.</p>"#;
		let md = to_markdown(html);
		assert!(md.contains("# Title"));
		assert!(md.contains("[example](https://example.com/)"));
	}

	#[test]
	fn skips_script_and_nav() {
		let html = "<nav>menu</nav><script>var x = 1;</script><p>body text</p>";
		let md = to_markdown(html);
		assert!(md.contains("body text"));
		assert!(!md.contains("menu"));
		assert!(!md.contains("var x"));
	}

	#[test]
	fn collapses_blank_runs() {
		let normalized = normalize("a\n\n\n\n\nb");
		assert_eq!(normalized, "a\n\n\nb");
	}
}
