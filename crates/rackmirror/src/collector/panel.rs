//! Panel resolution
//!
//! Most modules report their panel directly. A few plugins draw the panel
//! with an ordinary SVG child instead, so resolution walks an ordered list of
//! named resolvers and takes the first answer. The generic resolver is last.

use crate::geometry::Rect;
use crate::host::ModuleDescriptor;

/// Panel size (host pixels) and artwork
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub rect: Rect,
    pub svg: String,
}

pub struct PanelResolver {
    pub name: &'static str,
    pub resolve: fn(&ModuleDescriptor) -> Option<Panel>,
}

pub const RESOLVERS: &[PanelResolver] = &[
    PanelResolver {
        name: "bogaudio",
        resolve: bogaudio,
    },
    PanelResolver {
        name: "mockba",
        resolve: mockba,
    },
    PanelResolver {
        name: "generic",
        resolve: generic,
    },
];

/// First resolver that finds a panel, with its name
pub fn resolve_panel(module: &ModuleDescriptor) -> Option<(&'static str, Panel)> {
    RESOLVERS
        .iter()
        .find_map(|r| (r.resolve)(module).map(|panel| (r.name, panel)))
}

fn same_size(a: &Rect, b: &Rect) -> bool {
    (a.size.x - b.size.x).abs() < 0.5 && (a.size.y - b.size.y).abs() < 0.5
}

/// Bogaudio paints its panel as a full-size SVG child
fn bogaudio(module: &ModuleDescriptor) -> Option<Panel> {
    if !module.plugin.starts_with("Bogaudio") {
        return None;
    }
    module
        .svg_children
        .iter()
        .find(|child| same_size(&child.rect, &module.rect))
        .map(|child| Panel {
            rect: child.rect,
            svg: child.svg.clone(),
        })
}

/// Mockba's background is the SVG child anchored at the origin; the module
/// box gives the real size
fn mockba(module: &ModuleDescriptor) -> Option<Panel> {
    if module.plugin != "MockbaModular" {
        return None;
    }
    module
        .svg_children
        .iter()
        .find(|child| child.rect.pos.x == 0.0 && child.rect.pos.y == 0.0)
        .map(|child| Panel {
            rect: Rect {
                pos: child.rect.pos,
                size: module.rect.size,
            },
            svg: child.svg.clone(),
        })
}

fn generic(module: &ModuleDescriptor) -> Option<Panel> {
    let panel = module.panel.as_ref()?;
    let svg = panel.svg.as_ref().filter(|s| !s.is_empty())?;
    Some(Panel {
        rect: panel.rect,
        svg: svg.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{PanelDescriptor, SvgChild};

    fn descriptor(plugin: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            id: 1,
            plugin: plugin.into(),
            model: "M".into(),
            rect: Rect::new(0.0, 0.0, 90.0, 380.0),
            svg_children: vec![
                SvgChild {
                    rect: Rect::new(10.0, 10.0, 20.0, 20.0),
                    svg: "res/knob.svg".into(),
                },
                SvgChild {
                    rect: Rect::new(0.0, 0.0, 90.0, 380.0),
                    svg: "res/panel.svg".into(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_generic_panel() {
        let mut module = descriptor("Fundamental");
        module.panel = Some(PanelDescriptor {
            rect: Rect::new(0.0, 0.0, 90.0, 380.0),
            svg: Some("res/VCO.svg".into()),
        });
        let (name, panel) = resolve_panel(&module).unwrap();
        assert_eq!(name, "generic");
        assert_eq!(panel.svg, "res/VCO.svg");
    }

    #[test]
    fn test_bogaudio_uses_full_size_child() {
        let (name, panel) = resolve_panel(&descriptor("Bogaudio")).unwrap();
        assert_eq!(name, "bogaudio");
        assert_eq!(panel.svg, "res/panel.svg");
    }

    #[test]
    fn test_mockba_uses_origin_child() {
        let mut module = descriptor("MockbaModular");
        module.svg_children[1].rect.size.y = 100.0;
        let (name, panel) = resolve_panel(&module).unwrap();
        assert_eq!(name, "mockba");
        assert_eq!(panel.rect.size.y, 380.0);
    }

    #[test]
    fn test_unresolvable_panel() {
        let mut module = descriptor("Fundamental");
        module.panel = Some(PanelDescriptor {
            rect: Rect::new(0.0, 0.0, 90.0, 380.0),
            svg: None,
        });
        assert!(resolve_panel(&module).is_none());
    }
}
