//! GraphQL documents sent to the routing API.

use nearby_transit::{StopIdentifier, StopsQuery};

/// Stops within `radius_m` of the query position with the patterns serving them
pub fn stops_by_radius(query: &StopsQuery) -> String {
    format!(
        r#"{{
  stopsByRadius(lat: {lat}, lon: {lon}, radius: {radius}) {{
    edges {{
      node {{
        distance
        stop {{
          gtfsId
          name
          platformCode
          patterns {{
            code
            directionId
            headsign
            route {{
              shortName
              longName
              mode
            }}
          }}
        }}
      }}
    }}
  }}
}}"#,
        lat = query.coordinates.latitude,
        lon = query.coordinates.longitude,
        radius = query.radius_m,
    )
}

/// The next `count` departures from one stop
pub fn stop_departures(stop_id: &StopIdentifier, count: u32) -> String {
    // JSON string escaping is valid GraphQL string escaping
    let id = serde_json::Value::String(stop_id.to_string());

    format!(
        r#"{{
  stop(id: {id}) {{
    name
    stoptimesWithoutPatterns(numberOfDepartures: {count}) {{
      scheduledDeparture
      realtimeDeparture
      departureDelay
      realtime
      realtimeState
      serviceDay
      headsign
      trip {{
        route {{
          shortName
          longName
          mode
        }}
      }}
    }}
  }}
}}"#
    )
}
