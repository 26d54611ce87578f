// build.rs
// Compiles the GLSL shaders in resources/shaders to SPIR-V under <workspace>/target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 6] = ["vert", "frag", "comp", "geom", "tesc", "tese"];

/// Compile every shader stage file in `shader_dir`, recursing into subdirectories
fn compile_shaders_recursive(shader_dir: &Path, target_dir: &Path, glslc: &Path, compiled_count: &mut u32) {
    let shader_files = match std::fs::read_dir(shader_dir) {
        Ok(files) => files,
        Err(_) => {
            println!("cargo:warning=No shader directory found at: {}", shader_dir.display());
            return;
        }
    };

    for entry in shader_files.flatten() {
        let path = entry.path();

        if path.is_dir() {
            compile_shaders_recursive(&path, target_dir, glslc, compiled_count);
            continue;
        }

        let is_stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_stage {
            continue;
        }

        // cube.vert -> cube.vert.spv, so stages of one shader never collide
        let out_file = target_dir.join(format!("{file_name}.spv"));
        if is_up_to_date(&path, &out_file) {
            eprintln!("info: Shader {file_name} is up to date");
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", file_name, out_file.display());
                *compiled_count += 1;
            }
            Ok(s) => panic!("glslc failed for {} with exit code {}", path.display(), s.code().unwrap_or(-1)),
            Err(e) => panic!("Failed to run glslc for {}: {}", path.display(), e),
        }
    }
}

fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src <= dst,
        _ => false,
    }
}

/// glslc from the Vulkan SDK if set, otherwise whatever is on PATH
fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let bin = if cfg!(target_os = "windows") { "Bin/glslc.exe" } else { "bin/glslc" };
        let candidate = Path::new(&sdk).join(bin);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let probe = Command::new("glslc").arg("--version").output();
    match probe {
        Ok(output) if output.status.success() => Some(PathBuf::from("glslc")),
        _ => None,
    }
}

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var_os("SKIP_SHADERS").is_some() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=glslc not found; shaders not compiled (install the Vulkan SDK or put glslc on PATH)");
        return;
    };

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let workspace_root = manifest_dir.parent().map_or_else(|| manifest_dir.clone(), Path::to_path_buf);
    let shader_dir = manifest_dir.join("resources/shaders");
    let target_dir = workspace_root.join("target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {}", target_dir.display(), e);
        return;
    }

    let mut compiled_count = 0;
    compile_shaders_recursive(&shader_dir, &target_dir, &glslc, &mut compiled_count);

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {compiled_count} shader(s)");
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
