//! # Text Processing Module
//!
//! Trasformazioni testuali delegate a tool esterni: ottimizzazione SVG,
//! minificazione HTML e minificazione JavaScript.
//!
//! ## Tool:
//! - **SVG**: `svgo` con config generata (multipass, `viewBox` preservato,
//!   `width`/`height` rimossi)
//! - **HTML**: `html-minifier-terser` (collapse whitespace, rimozione commenti,
//!   CSS/JS inline minificati, attributi vuoti rimossi)
//! - **JavaScript**: `terser` (compress + mangle, nessuna source map)
//!
//! Ogni errore (tool mancante, errore di sintassi, timeout) viene restituito al
//! chiamante, che ripiega sulla copia verbatim del file.

use crate::error::{OptimizeError, Result};
use crate::platform::ToolResolver;
use crate::tool_args;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// Per-file limit for text tools
pub const TEXT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

pub const TEXT_TOOLS: &[&str] = &["svgo", "html-minifier-terser", "terser"];

/// Text-to-text transform (optimizer or minifier)
#[async_trait]
pub trait TextTransform: Send + Sync {
    fn name(&self) -> &'static str;
    async fn transform(&self, source: &str) -> Result<String>;
}

/// Stage `source` in a temp dir, run the tool, read back its output file
async fn run_text_tool(
    tools: &ToolResolver,
    tool: &str,
    extension: &str,
    source: &str,
    build_args: impl FnOnce(&Path, &Path, &Path) -> Result<Vec<OsString>>,
) -> Result<String> {
    let staging = tempfile::tempdir().map_err(|e| OptimizeError::io(&std::env::temp_dir(), e))?;
    let input = staging.path().join(format!("input.{}", extension));
    let output = staging.path().join(format!("output.{}", extension));

    tokio::fs::write(&input, source)
        .await
        .map_err(|e| OptimizeError::io(&input, e))?;

    let args = build_args(&input, &output, staging.path())?;
    tools.run(tool, &args, TEXT_TOOL_TIMEOUT).await?;

    let bytes = tokio::fs::read(&output)
        .await
        .map_err(|e| OptimizeError::io(&output, e))?;
    String::from_utf8(bytes)
        .map_err(|_| OptimizeError::Minify(format!("{} produced invalid UTF-8", tool)))
}

/// svgo options
#[derive(Debug, Clone, PartialEq)]
pub struct SvgOptions {
    pub multipass: bool,
    pub keep_view_box: bool,
    pub remove_dimensions: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            multipass: true,
            keep_view_box: true,
            remove_dimensions: true,
        }
    }
}

impl SvgOptions {
    /// CommonJS config file understood by `svgo --config`
    pub fn to_config_js(&self) -> String {
        let mut plugins = vec![if self.keep_view_box {
            r#"{ name: "preset-default", params: { overrides: { removeViewBox: false } } }"#
        } else {
            r#""preset-default""#
        }];
        if self.remove_dimensions {
            plugins.push(r#""removeDimensions""#);
        }
        format!(
            "module.exports = {{\n  multipass: {},\n  plugins: [\n    {},\n  ],\n}};\n",
            self.multipass,
            plugins.join(",\n    ")
        )
    }
}

pub struct SvgOptimizer {
    tools: ToolResolver,
    options: SvgOptions,
}

impl SvgOptimizer {
    pub fn new(tools: ToolResolver) -> Self {
        Self {
            tools,
            options: SvgOptions::default(),
        }
    }
}

#[async_trait]
impl TextTransform for SvgOptimizer {
    fn name(&self) -> &'static str {
        "svgo"
    }

    async fn transform(&self, source: &str) -> Result<String> {
        let config = self.options.to_config_js();
        run_text_tool(&self.tools, "svgo", "svg", source, |input, output, staging| {
            let config_path = staging.join("svgo.config.cjs");
            std::fs::write(&config_path, config).map_err(|e| OptimizeError::io(&config_path, e))?;
            Ok(tool_args!["--quiet", "--config", config_path, "-i", input, "-o", output])
        })
        .await
    }
}

/// html-minifier-terser options
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlOptions {
    pub collapse_whitespace: bool,
    pub remove_comments: bool,
    pub minify_css: bool,
    pub minify_js: bool,
    pub remove_empty_attributes: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            remove_comments: true,
            minify_css: true,
            minify_js: true,
            remove_empty_attributes: true,
        }
    }
}

impl HtmlOptions {
    pub fn to_args(&self) -> Vec<OsString> {
        let flags = [
            (self.collapse_whitespace, "--collapse-whitespace"),
            (self.remove_comments, "--remove-comments"),
            (self.remove_empty_attributes, "--remove-empty-attributes"),
        ];
        let mut args: Vec<OsString> = flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| OsString::from(flag))
            .collect();
        if self.minify_css {
            args.extend(tool_args!["--minify-css", "true"]);
        }
        if self.minify_js {
            args.extend(tool_args!["--minify-js", "true"]);
        }
        args
    }
}

pub struct HtmlMinifier {
    tools: ToolResolver,
    options: HtmlOptions,
}

impl HtmlMinifier {
    pub fn new(tools: ToolResolver) -> Self {
        Self {
            tools,
            options: HtmlOptions::default(),
        }
    }
}

#[async_trait]
impl TextTransform for HtmlMinifier {
    fn name(&self) -> &'static str {
        "html-minifier-terser"
    }

    async fn transform(&self, source: &str) -> Result<String> {
        let mut args = self.options.to_args();
        run_text_tool(&self.tools, self.name(), "html", source, |input, output, _| {
            args.extend(tool_args!["-o", output, input]);
            Ok(args)
        })
        .await
    }
}

/// terser options
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub compress: bool,
    pub mangle: bool,
    pub source_map: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            compress: true,
            mangle: true,
            source_map: false,
        }
    }
}

pub struct ScriptMinifier {
    tools: ToolResolver,
    options: ScriptOptions,
}

impl ScriptMinifier {
    pub fn new(tools: ToolResolver) -> Self {
        Self {
            tools,
            options: ScriptOptions::default(),
        }
    }

    pub fn terser_args(options: &ScriptOptions, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args = tool_args![input];
        if options.compress {
            args.extend(tool_args!["--compress"]);
        }
        if options.mangle {
            args.extend(tool_args!["--mangle"]);
        }
        if options.source_map {
            args.extend(tool_args!["--source-map"]);
        }
        args.extend(tool_args!["-o", output]);
        args
    }
}

#[async_trait]
impl TextTransform for ScriptMinifier {
    fn name(&self) -> &'static str {
        "terser"
    }

    async fn transform(&self, source: &str) -> Result<String> {
        let options = self.options.clone();
        run_text_tool(&self.tools, "terser", "js", source, move |input, output, _| {
            Ok(Self::terser_args(&options, input, output))
        })
        .await
    }
}
