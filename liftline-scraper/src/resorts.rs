//! Known resorts and their terrain-status pages.

use liftline_core::normalize_key;

/// `(key, terrain page)` for every supported resort.
pub const TERRAIN_URLS: &[(&str, &str)] = &[
    // Colorado
    ("vail", "https://www.vail.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("beavercreek", "https://www.beavercreek.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("breckenridge", "https://www.breckenridge.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("keystone", "https://www.keystoneresort.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("crestedbutte", "https://www.skicb.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    // Utah
    ("parkcity", "https://www.parkcitymountain.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    // Tahoe
    ("heavenly", "https://www.skiheavenly.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("northstar", "https://www.northstarcalifornia.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("kirkwood", "https://www.kirkwood.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    // Pacific Northwest
    ("stevenspass", "https://www.stevenspass.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("whistlerblackcomb", "https://www.whistlerblackcomb.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    // Northeast
    ("stowe", "https://www.stowe.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx"),
    ("okemo", "https://www.okemo.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("mtsnow", "https://www.mountsnow.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("mountsunapee", "https://www.mountsunapee.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("attitashmountain", "https://www.attitash.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("wildcatmountain", "https://www.skiwildcat.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("crotchedmountain", "https://www.crotchedmtn.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("hunter", "https://www.huntermtn.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    // Mid-Atlantic
    ("sevensprings", "https://www.7springs.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("libertymountain", "https://www.libertymountainresort.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("roundtopmountain", "https://www.skiroundtop.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("whitetail", "https://www.skiwhitetail.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("jackfrostbigboulder", "https://www.jfbb.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("hiddenvalleypa", "https://www.hiddenvalleyresort.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("laurelmountain", "https://www.laurelmountainski.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    // Midwest
    ("aftonalps", "https://www.aftonalps.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("mtbrighton", "https://www.mtbrighton.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("wilmotmountain", "https://www.wilmotmountain.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("alpinevalley", "https://www.alpinevalleyohio.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("bmbw", "https://www.bmbw.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("madrivermountain", "https://www.skimadriver.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("hiddenvalley", "https://www.hiddenvalleyski.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("snowcreek", "https://www.skisnowcreek.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
    ("paolipeaks", "https://www.paolipeaks.com/the-mountain/mountain-conditions/lift-and-terrain-status.aspx"),
];

/// Terrain page for `key`, if the resort is known.
pub fn terrain_url(key: &str) -> Option<&'static str> {
    let key = normalize_key(key);
    TERRAIN_URLS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, url)| *url)
}

/// All resort keys, in table order.
pub fn resort_keys() -> Vec<&'static str> {
    TERRAIN_URLS.iter().map(|(k, _)| *k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_complete_and_unique() {
        let keys = resort_keys();
        assert_eq!(keys.len(), 35);
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), 35);
        assert_eq!(keys[0], "vail");
        assert!(TERRAIN_URLS.iter().all(|(_, url)| url.starts_with("https://") && url.ends_with(".aspx")));
    }

    #[test]
    fn test_lookup_normalizes_key() {
        assert_eq!(
            terrain_url(" Stowe "),
            Some("https://www.stowe.com/the-mountain/mountain-conditions/terrain-and-lift-status.aspx")
        );
        assert!(terrain_url("niseko").is_none());
        assert!(terrain_url("").is_none());
    }
}
