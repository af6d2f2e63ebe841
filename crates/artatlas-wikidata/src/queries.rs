//! SPARQL query text for the two fetch phases.
//!
//! Phase 1 ranks painters by sitelink count (the popularity proxy) and
//! relies on the endpoint's stable native ordering for ties. Phase 2 is
//! templated by the painter entity IRI from phase 1.

/// Phase 1: up to `limit` painters, most cross-referenced first.
pub fn top_painters(limit: usize) -> String {
    format!(
        r#"SELECT ?painter ?painterLabel ?sitelinks WHERE {{
  ?painter wdt:P106 wd:Q1028181 ;
           wikibase:sitelinks ?sitelinks .
  FILTER(?sitelinks > 0)
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}
ORDER BY DESC(?sitelinks)
LIMIT {limit}"#
    )
}

/// Phase 2: one painter's paintings with holding museum, geometry, and
/// city/country where the graph has them.
pub fn painter_artworks(painter_iri: &str) -> String {
    format!(
        r#"SELECT ?painterLabel ?paintingLabel ?museumLabel ?cityLabel ?countryLabel ?coords WHERE {{
  VALUES ?painter {{ <{painter_iri}> }}
  ?painting wdt:P170 ?painter ;
            wdt:P31 wd:Q3305213 ;
            wdt:P195 ?museum .
  OPTIONAL {{ ?museum wdt:P625 ?coords . }}
  OPTIONAL {{ ?museum wdt:P131 ?city . }}
  OPTIONAL {{ ?museum wdt:P17 ?country . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}"#
    )
}
