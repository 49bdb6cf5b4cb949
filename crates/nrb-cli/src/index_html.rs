//! Entry document rewriting.
//!
//! The HTML template only needs `</head>` and `</body>`; the entry stylesheet, the
//! module script and its preload link are injected unless the template already
//! references them. Both functions are pure and idempotent: running them on their
//! own output reports no change.

use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;

const PUBLIC_URL_MARKER: &str = "%PUBLIC_URL%";

/// Inject the entry assets and substitute `%PUBLIC_URL%`.
///
/// Returns the rewritten document and whether anything changed.
pub fn inject_into_index(
    html: &str,
    entry_file_name: &str,
    assets_dir: &str,
    public_url: &str,
) -> (String, bool) {
    let name = entry_basename(entry_file_name);
    let base = public_url.trim_end_matches('/');
    let mut html = html.to_string();
    let mut changed = false;

    let css = format!("/{assets_dir}/{name}.css");
    if !html.contains(&css) {
        let links = format!(
            "<link rel=\"preload\" href=\"{base}{css}\" as=\"style\">\n\
             <link rel=\"stylesheet\" href=\"{base}{css}\">\n</head>"
        );
        changed |= replace_first(&mut html, "</head>", &links);
    }

    let js = format!("/{assets_dir}/{name}.js");
    if !html.contains(&js) {
        let script = format!("<script type=\"module\" src=\"{base}{js}\"></script>\n</body>");
        changed |= replace_first(&mut html, "</body>", &script);
        let preload = format!("<link rel=\"modulepreload\" href=\"{base}{js}\">\n</head>");
        changed |= replace_first(&mut html, "</head>", &preload);
    }

    if html.contains(PUBLIC_URL_MARKER) {
        html = html.replace(PUBLIC_URL_MARKER, base);
        changed = true;
    }

    (html, changed)
}

/// The subset of an esbuild metafile needed to find chunks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metafile {
    #[serde(default)]
    pub outputs: IndexMap<String, MetafileOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutput {
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub inputs: IndexMap<String, MetafileOutputInput>,
    #[serde(default)]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutputInput {
    #[serde(default)]
    pub bytes_in_output: u64,
}

/// Paths where the entry module's `modulepreload` link is found and chunks are named.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLayout<'a> {
    pub entry_file_name: &'a str,
    pub assets_dir: &'a str,
    /// Output directory as it appears in metafile keys (e.g. "build")
    pub output_dir: &'a str,
}

/// JavaScript chunks built from any input starting with one of `prefixes`, in
/// metafile order, as paths relative to the output directory.
pub fn chunks_to_preload(
    metafile: &Metafile,
    prefixes: &[String],
    layout: ChunkLayout<'_>,
) -> IndexSet<String> {
    let output_prefix = format!(
        "{}/",
        Path::new(layout.output_dir)
            .join(layout.assets_dir)
            .to_string_lossy()
            .replace('\\', "/")
    );

    metafile
        .outputs
        .iter()
        .filter(|(path, _)| path.ends_with(".js"))
        .filter(|(_, output)| {
            output
                .inputs
                .keys()
                .any(|input| prefixes.iter().any(|p| input.starts_with(p.as_str())))
        })
        .map(|(path, _)| match path.strip_prefix(&output_prefix) {
            Some(rest) => format!("{}/{}", layout.assets_dir, rest),
            None => path.clone(),
        })
        .collect()
}

/// Add a `modulepreload` link for every chunk built from a preloaded prefix.
///
/// The entry module's own link is kept; new links copy its quoting and URL prefix
/// and are inserted before it. Chunks already linked are skipped.
pub fn preload_chunks(
    html: &str,
    metafile: &Metafile,
    prefixes: &[String],
    layout: ChunkLayout<'_>,
) -> (String, bool) {
    let chunks = chunks_to_preload(metafile, prefixes, layout);
    let name = entry_basename(layout.entry_file_name);
    let entry_chunk = format!("{}/{}.js", layout.assets_dir, name);

    let pending: Vec<&String> = chunks
        .iter()
        .filter(|chunk| **chunk != entry_chunk && !html.contains(chunk.as_str()))
        .collect();
    if pending.is_empty() {
        return (html.to_string(), false);
    }

    let pattern = format!(
        r#"<link rel=(["']?)modulepreload(["']?) href=(["']?)([^"'\s>]*?){}/{}\.js(["']?)( ?/?)>"#,
        regex::escape(layout.assets_dir),
        regex::escape(&name)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return (html.to_string(), false);
    };
    if !re.is_match(html) {
        return (html.to_string(), false);
    }

    let rewritten = re.replace(html, |caps: &Captures<'_>| {
        let mut links = String::new();
        for chunk in &pending {
            links.push_str(&format!(
                "<link rel={q1}modulepreload{q2} href={q3}{prefix}{chunk}{q4}{close}>\n",
                q1 = &caps[1],
                q2 = &caps[2],
                q3 = &caps[3],
                prefix = &caps[4],
                q4 = &caps[5],
                close = &caps[6],
            ));
        }
        links.push_str(&caps[0]);
        links
    });

    (rewritten.into_owned(), true)
}

fn entry_basename(entry_file_name: &str) -> String {
    Path::new(entry_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry_file_name.to_string())
}

fn replace_first(html: &mut String, marker: &str, replacement: &str) -> bool {
    match html.find(marker) {
        Some(at) => {
            html.replace_range(at..at + marker.len(), replacement);
            true
        }
        None => false,
    }
}
