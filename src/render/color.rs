//! CSS colour parsing.
//!
//! Supports the forms the editor produces: `#rgb`, `#rgba`, `#rrggbb`,
//! `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)`, `transparent` and a few
//! named colours.

use image::Rgba;

/// Parse a CSS colour string. Empty strings and `none` yield `None`.
pub fn parse_color(input: &str) -> Option<Rgba<u8>> {
    let s = input.trim().to_ascii_lowercase();
    if s.is_empty() || s == "none" {
        return None;
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = s.strip_prefix("rgba(").or_else(|| s.strip_prefix("rgb(")) {
        return parse_rgb_args(args.strip_suffix(')')?);
    }
    named(&s)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    let nibble = |c: char| c.to_digit(16).map(|d| (d * 17) as u8);
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    let chars: Vec<char> = hex.chars().collect();
    match chars.len() {
        3 | 4 => {
            let a = if chars.len() == 4 { nibble(chars[3])? } else { 255 };
            Some(Rgba([nibble(chars[0])?, nibble(chars[1])?, nibble(chars[2])?, a]))
        }
        6 | 8 if hex.is_ascii() => {
            let a = if hex.len() == 8 { byte(&hex[6..8])? } else { 255 };
            Some(Rgba([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, a]))
        }
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        if let Some(pct) = s.strip_suffix('%') {
            let v: f32 = pct.trim().parse().ok()?;
            Some((v.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let v: f32 = s.parse().ok()?;
            Some(v.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = match parts.get(3) {
        Some(a) => {
            let v: f32 = a.parse().ok()?;
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha]))
}

fn named(name: &str) -> Option<Rgba<u8>> {
    let rgb = match name {
        "transparent" => return Some(Rgba([0, 0, 0, 0])),
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}
