use ratatui::style::Color;

/// A named color palette for the whole UI.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub success: Color,
  pub warning: Color,
  pub error: Color,
  pub tag: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Slate",
    bg: Color::Rgb(15, 17, 21),
    fg: Color::Rgb(240, 242, 245),
    accent: Color::Rgb(99, 140, 255),
    muted: Color::Rgb(130, 138, 150),
    border: Color::Rgb(45, 50, 60),
    highlight_fg: Color::Rgb(240, 242, 245),
    highlight_bg: Color::Rgb(45, 52, 65),
    stripe_bg: Color::Rgb(24, 27, 33),
    status: Color::Rgb(120, 200, 255),
    success: Color::Rgb(110, 200, 140),
    warning: Color::Rgb(240, 190, 90),
    error: Color::Rgb(240, 100, 100),
    tag: Color::Rgb(170, 150, 255),
    key_fg: Color::Rgb(15, 17, 21),
    key_bg: Color::Rgb(130, 138, 150),
  },
  Theme {
    name: "Ember",
    bg: Color::Rgb(28, 20, 18),
    fg: Color::Rgb(245, 232, 220),
    accent: Color::Rgb(255, 140, 80),
    muted: Color::Rgb(160, 135, 120),
    border: Color::Rgb(70, 52, 45),
    highlight_fg: Color::Rgb(28, 20, 18),
    highlight_bg: Color::Rgb(255, 170, 110),
    stripe_bg: Color::Rgb(36, 27, 24),
    status: Color::Rgb(255, 200, 120),
    success: Color::Rgb(160, 210, 120),
    warning: Color::Rgb(255, 210, 90),
    error: Color::Rgb(255, 95, 85),
    tag: Color::Rgb(240, 160, 190),
    key_fg: Color::Rgb(28, 20, 18),
    key_bg: Color::Rgb(160, 135, 120),
  },
  Theme {
    name: "Moss",
    bg: Color::Rgb(18, 24, 20),
    fg: Color::Rgb(225, 236, 226),
    accent: Color::Rgb(120, 200, 140),
    muted: Color::Rgb(120, 145, 128),
    border: Color::Rgb(48, 64, 54),
    highlight_fg: Color::Rgb(18, 24, 20),
    highlight_bg: Color::Rgb(150, 215, 165),
    stripe_bg: Color::Rgb(24, 32, 27),
    status: Color::Rgb(150, 220, 200),
    success: Color::Rgb(150, 225, 150),
    warning: Color::Rgb(230, 200, 110),
    error: Color::Rgb(230, 110, 100),
    tag: Color::Rgb(200, 220, 130),
    key_fg: Color::Rgb(18, 24, 20),
    key_bg: Color::Rgb(120, 145, 128),
  },
];

/// Position of the theme called `name`, falling back to the first.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_is_case_insensitive() {
    assert_eq!(theme_index(Some("moss")), 2);
    assert_eq!(theme_index(Some("EMBER")), 1);
  }

  #[test]
  fn unknown_theme_falls_back_to_first() {
    assert_eq!(theme_index(Some("neon")), 0);
    assert_eq!(theme_index(None), 0);
  }
}
