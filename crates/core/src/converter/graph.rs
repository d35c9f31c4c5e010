//! Filter graph and encoder argument construction.
//!
//! Builds the complete argument list for one engine run from the target
//! format, the stream hypothesis under test and the pre-processing options.
//! Nothing here talks to an engine, so identical inputs always produce
//! identical arguments.
//!
//! The two pre-filter clauses are emitted in different orders depending on
//! the path: scale then frame rate when chained after the alpha merge, frame
//! rate then scale in the plain `-vf` chain of the no-alpha fallback.

use super::format::OutputFormat;
use super::types::{PreprocessOptions, StreamHypothesis, INPUT_NAME};

/// Bounds the longer side to 128 without upscaling.
pub const SCALE_128_CLAUSE: &str =
    "scale='min(128,iw)':'min(128,ih)':force_original_aspect_ratio=decrease";

/// Fixed 10 fps output rate.
pub const FPS_10_CLAUSE: &str = "fps=10";

/// Format-specific pieces appended after the shared stages.
struct FormatTail {
    /// Appended to the alpha-merge graph.
    alpha_graph: &'static str,
    /// Plain chain used by the no-alpha path, if the format needs one.
    plain_chain: Option<&'static str>,
    /// Encoder/muxer arguments for the alpha path.
    alpha_args: &'static [&'static str],
    /// Encoder/muxer arguments for the no-alpha path.
    plain_args: &'static [&'static str],
}

const GIF_TAIL: FormatTail = FormatTail {
    alpha_graph: "split[s0][s1];[s0]palettegen=reserve_transparent=1[p];[s1][p]paletteuse=dither=none",
    plain_chain: Some("split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"),
    alpha_args: &["-gifflags", "+transdiff"],
    plain_args: &[],
};

const APNG_TAIL: FormatTail = FormatTail {
    alpha_graph: "",
    plain_chain: None,
    alpha_args: &["-f", "apng", "-plays", "0"],
    plain_args: &["-f", "apng", "-plays", "0"],
};

const WEBP_TAIL: FormatTail = FormatTail {
    alpha_graph: "",
    plain_chain: None,
    alpha_args: &["-c:v", "libwebp", "-lossless", "1", "-loop", "0"],
    plain_args: &["-c:v", "libwebp", "-lossless", "1", "-loop", "0"],
};

fn tail_for(format: OutputFormat) -> &'static FormatTail {
    match format {
        OutputFormat::Gif => &GIF_TAIL,
        OutputFormat::Apng => &APNG_TAIL,
        OutputFormat::Webp => &WEBP_TAIL,
    }
}

/// Builds engine argument lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterGraphBuilder;

impl FilterGraphBuilder {
    /// Builds the full argument list for one attempt.
    pub fn build(
        format: OutputFormat,
        hypothesis: StreamHypothesis,
        options: &PreprocessOptions,
    ) -> Vec<String> {
        let tail = tail_for(format);
        let mut args = vec!["-i".to_string(), INPUT_NAME.to_string()];

        match hypothesis {
            StreamHypothesis::AlphaPair { color, alpha } => {
                let mut stages = vec![format!("[0:v:{}][0:v:{}]alphamerge", color, alpha)];
                stages.extend(Self::inline_prefilter(options));
                if !tail.alpha_graph.is_empty() {
                    stages.push(tail.alpha_graph.to_string());
                }

                args.extend(["-filter_complex".to_string(), stages.join(",")]);
                args.extend(tail.alpha_args.iter().map(|a| a.to_string()));
            }
            StreamHypothesis::NoAlpha => {
                let mut chain = Self::chain_prefilter(options);
                if let Some(plain) = tail.plain_chain {
                    chain.push(plain.to_string());
                }

                if !chain.is_empty() {
                    args.extend(["-vf".to_string(), chain.join(",")]);
                }
                args.extend(tail.plain_args.iter().map(|a| a.to_string()));
            }
        }

        args.extend(["-y".to_string(), format.output_name()]);
        args
    }

    /// Pre-filter clauses chained after the alpha merge: scale, then rate.
    fn inline_prefilter(options: &PreprocessOptions) -> Vec<String> {
        let mut clauses = Vec::new();
        if options.constrain_to_128px {
            clauses.push(SCALE_128_CLAUSE.to_string());
        }
        if options.cap_frame_rate_10 {
            clauses.push(FPS_10_CLAUSE.to_string());
        }
        clauses
    }

    /// Pre-filter clauses for the plain chain: rate, then scale.
    fn chain_prefilter(options: &PreprocessOptions) -> Vec<String> {
        let mut clauses = Vec::new();
        if options.cap_frame_rate_10 {
            clauses.push(FPS_10_CLAUSE.to_string());
        }
        if options.constrain_to_128px {
            clauses.push(SCALE_128_CLAUSE.to_string());
        }
        clauses
    }
}
