use std::time::Duration;

use console::Style;
use imstack_core::frame::ReferenceFrame;
use imstack_core::loader::{LoadedStack, LoaderConfig};
use imstack_core::stack::stats;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_load_summary(config: &LoaderConfig, loaded: &LoadedStack, elapsed: Duration) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Image Stack"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(11)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Sample"),
        s.path.apply_to(config.sample_path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Format"),
        s.value.apply_to(config.format)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(config.worker_count)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Time"),
        s.value.apply_to(format!("{:.2}s", elapsed.as_secs_f64()))
    );
    println!();

    println!("  {}", s.header.apply_to("Sample"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Shape"),
        s.value.apply_to(loaded.sample_shape())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Type"),
        s.value.apply_to(loaded.dtype())
    );
    if let Some(st) = loaded.sample_stats() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Range"),
            s.value.apply_to(format!("{:.3} .. {:.3} (mean {:.3})", st.min, st.max, st.mean))
        );
    }
    println!();

    print_reference(&s, "Flat", loaded.flat());
    print_reference(&s, "Dark", loaded.dark());
}

fn print_reference(s: &Styles, name: &str, frame: Option<&ReferenceFrame>) {
    let Some(frame) = frame else {
        println!("  {:<14}{}", s.header.apply_to(name), s.disabled.apply_to("none"));
        println!();
        return;
    };

    let (h, w) = frame.dim();
    println!("  {}", s.header.apply_to(name));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Shape"),
        s.value.apply_to(format!("({h}, {w})"))
    );
    if let Some(st) = stats(frame.iter()) {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Mean"),
            s.value.apply_to(format!("{:.3}", st.mean))
        );
    }
    println!();
}
