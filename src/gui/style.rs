use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// A note pad, lighter while its note is on.
pub struct PadStyleSheet {
    pub on: bool,
}

impl StyleSheet for PadStyleSheet {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        let background = if self.on {
            Color::from_rgb8(0x99, 0x99, 0x99)
        } else {
            Color::from_rgb8(0x6b, 0x6e, 0x6c)
        };

        Appearance {
            shadow_offset: Default::default(),
            background: Some(Background::Color(background)),
            text_color: Color::WHITE,
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 3.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
