//! Scene ⇄ template conversion.

use tracing::{debug, info};

use crate::scene::{Composer, Element, Role};

use super::{ElementRecord, Template};

/// Substrings that mark a text as a price (compared lowercase).
const PRICE_KEYWORDS: &[&str] = &["r$", "preço", "preco", "valor"];

/// How untagged elements of a restored template get their roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleInference {
    /// Roles come only from persisted tags.
    Strict,
    /// Templates with no tags at all get roles by keyword and type.
    #[default]
    Legacy,
}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Records of an unknown or non-restorable type.
    pub skipped: usize,
    /// Images whose source failed to load.
    pub placeholders: usize,
    /// Roles assigned by inference.
    pub inferred: usize,
}

/// Capture the scene as records: background first, guides left out.
pub fn serialize_scene(composer: &Composer) -> Vec<ElementRecord> {
    let scene = composer.scene();
    let background = scene
        .background
        .iter()
        .filter_map(|node| ElementRecord::from_element(&node.element))
        .map(|mut rec| {
            rec.is_background = true;
            rec.id = None;
            rec
        });
    let nodes = scene
        .nodes
        .iter()
        .filter_map(|node| ElementRecord::from_element(&node.element));
    background.chain(nodes).collect()
}

/// Capture the scene as a new template.
pub fn serialize_template(composer: &Composer, name: &str, description: &str) -> Template {
    Template::new(name, description, serialize_scene(composer))
}

/// Replace the scene with `elements`.
///
/// The background is restored and settled first, so it is established
/// before anything else is measured. Grid cells, images and texts follow,
/// in that order, each with its stored geometry. A source that fails to
/// load is shown with the placeholder image and the restore continues.
pub async fn deserialize_into(
    composer: &mut Composer,
    elements: &[ElementRecord],
    inference: RoleInference,
) -> RestoreReport {
    let mut records = elements.to_vec();
    let mut report = RestoreReport::default();
    if inference == RoleInference::Legacy {
        report.inferred = infer_roles(&mut records);
    }

    composer.clear();

    if let Some(bg) = records.iter().find(|r| r.is_background) {
        match bg.to_element() {
            Some(Element::Image(img)) => {
                composer.set_background(img);
                report.restored += 1;
            }
            _ => report.skipped += 1,
        }
        composer.settle().await;
    }

    let passes: [fn(&ElementRecord) -> bool; 3] = [
        ElementRecord::is_grid_cell,
        ElementRecord::is_image,
        ElementRecord::is_text,
    ];
    for pass in passes {
        for rec in records.iter().filter(|r| !r.is_background && pass(r)) {
            if let Some(element) = rec.to_element() {
                composer.add(element);
                report.restored += 1;
            }
        }
    }
    report.skipped += records
        .iter()
        .filter(|r| !r.is_background && !r.is_grid_cell() && !r.is_image() && !r.is_text())
        .inspect(|r| debug!(kind = %r.kind, "skipping element of unsupported type"))
        .count();

    composer.settle().await;

    report.placeholders = composer
        .scene()
        .iter()
        .filter(|n| matches!(&n.element, Element::Image(img) if img.placeholder))
        .count();
    info!(
        restored = report.restored,
        skipped = report.skipped,
        placeholders = report.placeholders,
        inferred = report.inferred,
        "template restored"
    );
    report
}

/// Restore a whole template.
pub async fn load_template(
    composer: &mut Composer,
    template: &Template,
    inference: RoleInference,
) -> RestoreReport {
    debug!(id = %template.id, name = %template.name, "loading template");
    deserialize_into(composer, &template.elements, inference).await
}

pub fn is_price_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    PRICE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Assign roles to a legacy element list.
///
/// Only applies when no main-canvas element carries a tag. The first text
/// with a price keyword becomes the price, the first other text the
/// description and the first image the product image. Returns how many
/// roles were assigned.
pub fn infer_roles(records: &mut [ElementRecord]) -> usize {
    let main = |r: &ElementRecord| !r.is_background && r.cell_id.is_none() && !r.is_grid_cell();
    if records.iter().any(|r| main(r) && r.id.is_some()) {
        return 0;
    }

    let (mut price, mut description, mut image) = (false, false, false);
    let mut assigned = 0;
    for rec in records.iter_mut().filter(|r| main(r)) {
        let role = if rec.is_text() {
            let text = rec.text.as_deref().unwrap_or_default();
            if is_price_text(text) {
                (!price).then(|| {
                    price = true;
                    Role::Price
                })
            } else {
                (!description).then(|| {
                    description = true;
                    Role::Description
                })
            }
        } else if rec.is_image() {
            (!image).then(|| {
                image = true;
                Role::ProductImage
            })
        } else {
            None
        };
        if role.is_some() {
            rec.id = role;
            assigned += 1;
        }
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(t: &str) -> ElementRecord {
        ElementRecord {
            kind: "text".into(),
            text: Some(t.into()),
            ..Default::default()
        }
    }

    fn image(src: &str) -> ElementRecord {
        ElementRecord {
            kind: "image".into(),
            src: Some(src.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_price_keywords() {
        assert!(is_price_text("R$ 9,90"));
        assert!(is_price_text("Preço especial"));
        assert!(is_price_text("VALOR"));
        assert!(!is_price_text("ARROZ 5KG"));
    }

    #[test]
    fn test_legacy_inference() {
        let mut bg = image("bg.png");
        bg.is_background = true;
        let mut records = vec![
            bg,
            text("ARROZ 5KG"),
            text("R$ 9,90"),
            text("Oferta válida até domingo"),
            image("p.png"),
            image("logo.png"),
        ];
        assert_eq!(infer_roles(&mut records), 3);
        let roles: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(
            roles,
            vec![
                None,
                Some(Role::Description),
                Some(Role::Price),
                None,
                Some(Role::ProductImage),
                None
            ]
        );
    }

    #[test]
    fn test_tagged_templates_never_inferred() {
        let mut tagged = text("R$ 1,00");
        tagged.id = Some(Role::Validity);
        let mut records = vec![tagged, text("R$ 9,90"), image("p.png")];
        assert_eq!(infer_roles(&mut records), 0);
        assert_eq!(records[1].id, None);
        assert_eq!(records[2].id, None);
    }

    #[test]
    fn test_cell_content_ignored_by_inference() {
        let mut in_cell = text("R$ 2,00");
        in_cell.cell_id = Some(crate::scene::CellId::new());
        let mut records = vec![in_cell, text("R$ 3,00")];
        assert_eq!(infer_roles(&mut records), 1);
        assert_eq!(records[0].id, None);
        assert_eq!(records[1].id, Some(Role::Price));
    }
}
