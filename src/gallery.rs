//! Gallery page: a view model built from the store listing, rendered through
//! `templates/gallery.html`.

use askama::Template;

use crate::models::doodle::Doodle;

pub const TITLE: &str = "My Doodle Gallery";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoodleCard {
    pub image_url: String,
    pub alt: String,
    pub delete_id: String,
    pub caption: String,
}

impl From<&Doodle> for DoodleCard {
    fn from(d: &Doodle) -> Self {
        Self {
            image_url: d.url.clone(),
            alt: d.name.clone(),
            delete_id: d.id.clone(),
            caption: d
                .created_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Template, Debug)]
#[template(path = "gallery.html")]
pub struct GalleryView {
    pub title: String,
    pub cards: Vec<DoodleCard>,
}

impl GalleryView {
    pub fn new(doodles: &[Doodle]) -> Self {
        Self {
            title: TITLE.to_string(),
            cards: doodles.iter().map(DoodleCard::from).collect(),
        }
    }
}
