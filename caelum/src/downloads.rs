//! One-shot downloads: FITS cutouts, whole fields and footprint checks.
//!
//! Unlike queries these endpoints answer directly, with either the FITS
//! bytes or a JSON document. Non-success HTTP statuses here mean failure, so
//! they go through the checked GET instead of the query transport path.

use tracing::debug;

use crate::client::{Connection, LastContent};
use crate::error::{Error, Result};

impl Connection {
    /// Download a square cutout of the science image, `radius` pixels on a
    /// side around the given position, for one band or `"ALL"`.
    pub fn get_cut(&mut self, ra: f64, dec: f64, radius: u32, band: &str) -> Result<Vec<u8>> {
        let url = cut_url(self.origin(), ra, dec, radius, band);
        self.download(&url)
    }

    /// Download the weight-map cutout matching [`Connection::get_cut`].
    pub fn get_cut_weight(
        &mut self,
        ra: f64,
        dec: f64,
        radius: u32,
        band: &str,
    ) -> Result<Vec<u8>> {
        let url = cut_weight_url(self.origin(), ra, dec, radius, band);
        self.download(&url)
    }

    /// Download a whole observed field in one band.
    pub fn get_field(&mut self, field: &str, band: &str) -> Result<Vec<u8>> {
        let url = field_url(self.origin(), field, band);
        self.download(&url)
    }

    /// Download the weight map of a whole field in one band.
    pub fn get_field_weight(&mut self, field: &str, band: &str) -> Result<Vec<u8>> {
        let url = field_weight_url(self.origin(), field, band);
        self.download(&url)
    }

    /// Ask which data releases cover a position.
    pub fn check_coords(&mut self, ra: f64, dec: f64) -> Result<serde_json::Value> {
        let url = whichdr_url(self.origin(), ra, dec);
        debug!(%url, "footprint check");
        let credentials = self.credentials().clone();
        let body = self.transport_mut().get_checked(&url, &credentials)?;
        let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| Error::Decode {
            reason: format!("footprint response is not JSON: {}", e),
        })?;
        self.remember(LastContent::Json(value.clone()));
        Ok(value)
    }

    fn download(&mut self, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "download");
        let credentials = self.credentials().clone();
        let bytes = self.transport_mut().get_checked(url, &credentials)?;
        self.remember(LastContent::Bytes(bytes.clone()));
        Ok(bytes)
    }
}

// The trailing /1 selects the service's default cutout variant.
fn cut_url(origin: &str, ra: f64, dec: f64, radius: u32, band: &str) -> String {
    format!("{}/api/get_direct_cut/{}/{}/{}/{}/1", origin, ra, dec, radius, band)
}

fn cut_weight_url(origin: &str, ra: f64, dec: f64, radius: u32, band: &str) -> String {
    format!(
        "{}/api/get_direct_cut_weight/{}/{}/{}/{}/1",
        origin, ra, dec, radius, band
    )
}

fn field_url(origin: &str, field: &str, band: &str) -> String {
    format!("{}/api/get_direct_field/{}/{}", origin, field, band)
}

fn field_weight_url(origin: &str, field: &str, band: &str) -> String {
    format!("{}/api/get_direct_field_weight/{}/{}", origin, field, band)
}

fn whichdr_url(origin: &str, ra: f64, dec: f64) -> String {
    format!("{}/api/whichdr/{}/{}", origin, ra, dec)
}
