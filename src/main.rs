use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;

use cad_viewer::cli::Cli;
use cad_viewer::config::ViewerConfig;
use cad_viewer::math::{parse_hex_color, rgb_to_hex};
use cad_viewer::session::{NoticeLevel, ViewerSession};
use cad_viewer::sources::{DefaultFetcher, OfflineFetcher, SourceFetcher};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let color = cli
        .color
        .as_deref()
        .map(|text| parse_hex_color(text).ok_or_else(|| anyhow!("Invalid color: {}", text)))
        .transpose()?;
    let config = ViewerConfig::resolve(cli.config.as_deref())?;
    let mut session = ViewerSession::new(config);

    pollster::block_on(async {
        session.load_paths(&cli.files).await;
        if cli.wants_example() {
            let fetcher: &dyn SourceFetcher = if cli.offline {
                &OfflineFetcher
            } else {
                &DefaultFetcher
            };
            session.load_example(fetcher).await;
        }
    });

    if let Some(color) = color {
        session.set_color(color);
    }
    if let Some(opacity) = cli.opacity {
        session.set_opacity(opacity);
    }
    if let Some(shading) = cli.shading {
        session.set_shading(shading);
    }
    if cli.wireframe {
        session.toggle_wireframe();
    }

    let mut written = None;
    if let Some(format) = cli.export {
        let artifact = session.export(format)?;
        std::fs::create_dir_all(&cli.out)
            .with_context(|| format!("Failed to create {}", cli.out.display()))?;
        let path = cli.out.join(artifact.filename);
        std::fs::write(&path, &artifact.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written = Some(path);
    }

    let notices = session.drain_notices();
    let stats = session.stats();

    if cli.json {
        let report = json!({
            "model": session.current_name(),
            "stats": stats,
            "notices": notices
                .iter()
                .map(|n| json!({ "level": format!("{:?}", n.level).to_lowercase(), "text": n.text }))
                .collect::<Vec<_>>(),
            "camera": session.camera().position.to_array(),
            "colors": session
                .current_model()
                .map(|model| {
                    model
                        .materials
                        .iter()
                        .map(|(_, m)| format!("#{:06x}", rgb_to_hex(m.color)))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            "export": written.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for notice in &notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", tag, notice.text);
    }
    if let Some(name) = session.current_name() {
        println!("Model:     {}", name);
        println!("Vertices:  {}", stats.vertices);
        println!("Faces:     {}", stats.faces);
        println!("Objects:   {}", stats.objects);
        println!("Materials: {}", stats.materials);
    }
    if let Some(path) = written {
        println!("Exported:  {}", path.display());
    }

    Ok(())
}
