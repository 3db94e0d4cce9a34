use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use scraper::{Html, Node, Selector};
use tracing::debug;

use crate::fetch::FetchAssets;

const EMBED_WIDTH: &str = "915";
const EMBED_HEIGHT: &str = "515";
const WISTIA_IFRAME_BASE: &str = "https://fast.wistia.net/embed/iframe/";
const MEDIA_PATH_MARKER: &str = "/embed/medias/";
const MEDIA_SUFFIX_MARKER: &str = ".jsonp";

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));
static SCRIPTED_VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.ssep-video").expect("valid selector"));
static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[src]").expect("valid selector"));
static RESPONSIVE_VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.wistia_responsive_padding").expect("valid selector"));
static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").expect("valid selector"));

/// Per-article asset outcome counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetStats {
    /// Image references rewritten to a local copy.
    pub localized: usize,
    /// Image references left pointing at their original remote URL.
    pub left_remote: usize,
}

#[derive(Debug, Clone)]
pub struct TransformedArticle {
    pub html: String,
    pub assets: AssetStats,
}

/// Rewrite one article body: localize image references into `asset_dir` and
/// normalize both legacy video-embed patterns into a fixed-size iframe.
///
/// `title` is the already sanitized article title, used for the iframe
/// `title` attribute. An empty body is a per-article failure; the driver
/// skips the article and moves on.
pub fn transform(
    html: &str,
    asset_dir: &Path,
    title: &str,
    fetcher: &dyn FetchAssets,
) -> Result<TransformedArticle> {
    if html.trim().is_empty() {
        bail!("article body is empty");
    }
    if !html.contains('<') {
        // A body that is a bare URL or plain text parses as a single text
        // node; worth a note, not a warning per article.
        debug!("article body contains no markup, passing through as text");
    }

    let mut doc = Html::parse_fragment(html);
    let assets = localize_images(&mut doc, asset_dir, fetcher);

    let mut replacements = Vec::new();
    for container in doc.select(&SCRIPTED_VIDEO_SELECTOR) {
        let Some(video_id) = container
            .select(&SCRIPT_SELECTOR)
            .filter_map(|script| script.value().attr("src"))
            .find_map(media_id_from_script_src)
        else {
            continue;
        };
        let src = format!("{WISTIA_IFRAME_BASE}{video_id}?seo=true&videoFoam=true");
        replacements.push((container.html(), embed_paragraph(&src, title)));
    }
    for container in doc.select(&RESPONSIVE_VIDEO_SELECTOR) {
        let Some(src) = container
            .select(&IFRAME_SELECTOR)
            .filter_map(|iframe| iframe.value().attr("src"))
            .next()
        else {
            continue;
        };
        replacements.push((container.html(), embed_paragraph(src, title)));
    }

    let mut output = doc.root_element().inner_html();
    for (original, replacement) in replacements {
        output = output.replacen(&original, &replacement, 1);
    }

    Ok(TransformedArticle {
        html: output,
        assets,
    })
}

/// Fetch every image reference and rewrite its `src` to `assets/<filename>`.
/// Each distinct URL is fetched once per article; failed fetches leave the
/// original reference untouched.
fn localize_images(doc: &mut Html, asset_dir: &Path, fetcher: &dyn FetchAssets) -> AssetStats {
    let mut stats = AssetStats::default();
    let mut fetched: HashMap<String, Option<String>> = HashMap::new();
    let mut rewrites = Vec::new();

    for element in doc.select(&IMG_SELECTOR) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let local = fetched
            .entry(src.to_string())
            .or_insert_with(|| fetcher.fetch_asset(src, asset_dir))
            .clone();
        match local {
            Some(filename) => {
                stats.localized += 1;
                rewrites.push((element.id(), format!("assets/{filename}")));
            }
            None => stats.left_remote += 1,
        }
    }

    for (node_id, local_src) in rewrites {
        if let Some(mut node) = doc.tree.get_mut(node_id)
            && let Node::Element(element) = node.value()
        {
            for (name, value) in element.attrs.iter_mut() {
                if &*name.local == "src" {
                    *value = local_src.as_str().into();
                }
            }
        }
    }
    stats
}

/// Extract the media id between `/embed/medias/` and `.jsonp`, the shape the
/// legacy scripted embeds use.
fn media_id_from_script_src(src: &str) -> Option<String> {
    let (_, rest) = src.split_once(MEDIA_PATH_MARKER)?;
    let (video_id, _) = rest.split_once(MEDIA_SUFFIX_MARKER)?;
    if video_id.is_empty() {
        return None;
    }
    Some(video_id.to_string())
}

fn embed_paragraph(src: &str, title: &str) -> String {
    format!(
        "<p><iframe width=\"{EMBED_WIDTH}\" height=\"{EMBED_HEIGHT}\" frameborder=\"0\" \
         scrolling=\"auto\" src=\"{src}\" title=\"{title}\" \
         allowfullscreen=\"allowfullscreen\"></iframe></p>"
    )
}
