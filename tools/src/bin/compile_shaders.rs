//! Cross-compiles the engine's GLSL shaders to SPIR-V with glslc from the
//! Vulkan SDK, inferring the shader stage from the filename suffix.

use clap::Parser;
use gantry_tools::{init_tracing, run_checked};
use globset::GlobBuilder;
use ignore::WalkBuilder;
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};

/// Environment variables the Vulkan SDK announces itself through.
const SDK_PATH_VARS: [&str; 2] = ["VK_SDK_PATH", "VULKAN_SDK"];

#[derive(Parser, Debug)]
#[command(name = "compile-shaders", version, about = "Compile GLSL shaders to SPIR-V")]
struct Cli {
    /// directory holding the engine's .glsl sources
    #[arg(long, default_value = "assets/Engine/Shaders")]
    shaders: PathBuf,
    /// glslc executable, looked up in the Vulkan SDK when omitted
    #[arg(long)]
    glslc: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
}

impl Stage {
    /// Stage encoded in the filename, e.g. `shadow_vs.glsl` is a vertex
    /// shader.
    fn from_file_name(name: &str) -> Option<Self> {
        [
            ("_vs", Self::Vertex),
            ("_hs", Self::TessControl),
            ("_ds", Self::TessEval),
            ("_gs", Self::Geometry),
            ("_fs", Self::Fragment),
            ("_cs", Self::Compute),
        ]
        .into_iter()
        .find_map(|(suffix, stage)| name.contains(suffix).then_some(stage))
    }

    fn glslc_name(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::TessControl => "tesscontrol",
            Self::TessEval => "tesseval",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }
}

/// Find glslc through the SDK environment variables.
fn locate_glslc() -> Option<PathBuf> {
    for var in SDK_PATH_VARS {
        let sdk = match std::env::var(var) {
            Ok(sdk) => PathBuf::from(sdk),
            Err(_) => continue,
        };

        for candidate in [sdk.join("bin/glslc"), sdk.join("Bin/glslc.exe")] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        warn!(%var, sdk = ?sdk, "SDK path does not contain glslc");
    }

    None
}

/// All .glsl sources under the shader directory.
fn collect_shaders(dir: &Path) -> Vec<PathBuf> {
    let glob = GlobBuilder::new("*.glsl")
        .build()
        .map(|glob| glob.compile_matcher());
    let matcher = match glob {
        Ok(matcher) => matcher,
        Err(e) => {
            error!("Failed to compile shader glob: {e}");
            exit(1)
        }
    };

    WalkBuilder::new(dir)
        .build()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map(|name| matcher.is_match(name))
                    .unwrap_or(false)
        })
        .collect()
}

fn compile(glslc: &Path, shader: &Path, stage: Stage) -> Result<(), gantry_tools::ToolError> {
    let output = shader.with_extension("spv");
    run_checked(
        &glslc.to_string_lossy(),
        &[
            "-O",
            &format!("-fshader-stage={}", stage.glslc_name()),
            &shader.to_string_lossy(),
            "-o",
            &output.to_string_lossy(),
        ],
        None,
    )
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if !cli.shaders.is_dir() {
        error!(dir = ?cli.shaders, "Shader directory not found");
        exit(1);
    }

    let glslc = match cli.glslc.or_else(locate_glslc) {
        Some(glslc) => glslc,
        None => {
            error!("No glslc found, set one of {SDK_PATH_VARS:?} or pass --glslc");
            exit(1);
        }
    };

    let mut compiled = 0usize;
    for shader in collect_shaders(&cli.shaders) {
        let name = shader
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stage = match Stage::from_file_name(&name) {
            Some(stage) => stage,
            None => {
                warn!(%name, "Failed to recognize shader stage by file name");
                continue;
            }
        };

        if let Err(e) = compile(&glslc, &shader, stage) {
            error!("{e}");
            exit(1);
        }
        compiled += 1;
    }

    info!(compiled, "Shader compilation finished");
}
