/*!
This module writes the text explanation attached to each predicted destination. The narrative quotes the training statistics of the destination wherever they exist, and falls back to a generic explanation when no attributions are available.
*/

use super::{Contribution, ShapDetails};
use crate::stats::{DatasetStats, DestinationStats, AGE_BRACKETS};
use num_traits::ToPrimitive;

/// Short descriptions of well known destinations, matched against the lowercased destination name.
const DESTINATION_INSIGHTS: &[(&str, &str)] = &[
	(
		"amsterdam",
		"its charming canals, world-class museums, and vibrant cultural scene",
	),
	(
		"paris",
		"its romantic atmosphere, iconic landmarks, and exceptional cuisine",
	),
	(
		"tokyo",
		"its unique blend of traditional culture and cutting-edge technology",
	),
	(
		"new york",
		"its fast-paced energy, Broadway shows, and diverse neighborhoods",
	),
	(
		"london",
		"its rich history, royal heritage, and thriving arts scene",
	),
	(
		"bali",
		"its tropical paradise setting, spiritual culture, and beautiful beaches",
	),
	(
		"bangkok",
		"its bustling street life, incredible food scene, and ornate temples",
	),
	(
		"sydney",
		"its stunning harbor, outdoor lifestyle, and friendly atmosphere",
	),
	(
		"rome",
		"its ancient history, incredible architecture, and authentic Italian culture",
	),
	(
		"barcelona",
		"its unique architecture, Mediterranean lifestyle, and artistic heritage",
	),
	(
		"berlin",
		"its dynamic cultural scene, historical significance, and vibrant nightlife",
	),
	(
		"dubai",
		"its luxurious shopping, modern architecture, and desert adventures",
	),
	(
		"marrakech",
		"its exotic souks, stunning architecture, and rich cultural traditions",
	),
];

pub fn destination_insight(destination: &str) -> &'static str {
	let destination = destination.to_lowercase();
	DESTINATION_INSIGHTS
		.iter()
		.find(|(key, _)| destination.contains(key))
		.map(|(_, insight)| *insight)
		.unwrap_or("its unique cultural attractions and travel experiences")
}

/// A sentence describing the confidence tier of `probability`. It is not part of the narrative.
pub fn confidence_explanation(probability: f32) -> &'static str {
	if probability > 0.7 {
		"The high confidence comes from strong alignment between your travel preferences and this destination's characteristics."
	} else if probability > 0.4 {
		"The moderate confidence indicates a good match, though some factors suggest other destinations might also appeal to you."
	} else if probability > 0.2 {
		"The lower confidence suggests this destination could work for you, but there are mixed signals in your preferences."
	} else {
		"The low confidence indicates this destination may not be the best match based on your stated preferences."
	}
}

/// The explanation used when no attributions are available for a prediction.
pub fn fallback_explanation(destination: &str) -> String {
	format!(
		"🎯 **{destination}** appears in your recommendations based on general travel patterns.

{destination} is known for {insight}.

**Why you're seeing this recommendation:**
Our model identified {destination} as a potential match based on your travel preferences, though we weren't able to generate a detailed breakdown of the specific factors. This sometimes happens with less common preference combinations.

**What this means:**
• {destination} has been popular with travelers who have similar basic characteristics to you
• Consider researching this destination to see if its attractions align with your interests
• The recommendation is based on successful trips by travelers with comparable profiles

**💡 Tip:** If you're curious about this destination, try adjusting some of your preferences (like trip duration or budget) to see how it affects your match score.",
		destination = destination,
		insight = destination_insight(destination),
	)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum FactorCategory {
	TravelPattern,
	Interest,
	Demographic,
	Other,
}

impl FactorCategory {
	const ALL: [FactorCategory; 4] = [
		FactorCategory::TravelPattern,
		FactorCategory::Interest,
		FactorCategory::Demographic,
		FactorCategory::Other,
	];

	fn of(feature: &str) -> Self {
		let feature = feature.to_lowercase();
		let contains_any = |keywords: &[&str]| keywords.iter().any(|keyword| feature.contains(keyword));
		if contains_any(&[
			"duration",
			"cost",
			"budget",
			"accommodation",
			"transportation",
		]) {
			FactorCategory::TravelPattern
		} else if contains_any(&["preference", "interest", "activity"]) {
			FactorCategory::Interest
		} else if contains_any(&["age", "group", "traveler"]) {
			FactorCategory::Demographic
		} else {
			FactorCategory::Other
		}
	}

	fn heading(self) -> &'static str {
		match self {
			FactorCategory::TravelPattern => "Travel Pattern Analysis",
			FactorCategory::Interest => "Interest Indicators",
			FactorCategory::Demographic => "Demographic Factors",
			FactorCategory::Other => "Other Factors",
		}
	}
}

/// A `Narrator` writes explanations using the statistics of the trips the model was trained on.
pub struct Narrator<'a> {
	pub stats: &'a DatasetStats,
	pub n_classes: usize,
}

impl<'a> Narrator<'a> {
	pub fn new(stats: &'a DatasetStats, n_classes: usize) -> Self {
		Self { stats, n_classes }
	}

	/// Write the explanation for predicting `destination`. Without contributions this is the fallback explanation.
	pub fn explain(&self, destination: &str, details: Option<&ShapDetails>) -> String {
		let details = match details {
			Some(details) if !details.contributions.is_empty() => details,
			_ => return fallback_explanation(destination),
		};
		let probability = details.final_probability;
		let contributions = &details.contributions;
		let mut lines = vec![
			format!("Predicted Next Travel Destination: {}", destination),
			format!("Confidence: {}", percent(probability, 0)),
			"Why this prediction was made:".to_owned(),
			self.prediction_summary(destination, probability, contributions),
			String::new(),
			"Key factors influencing this prediction:".to_owned(),
		];
		let total_contribution: f32 = contributions.iter().map(|c| c.contribution.abs()).sum();
		for category in FactorCategory::ALL.iter() {
			let factors: Vec<&Contribution> = contributions
				.iter()
				.filter(|c| FactorCategory::of(&c.feature) == *category)
				.collect();
			if factors.is_empty() {
				continue;
			}
			let weight = if total_contribution > 0.0 {
				factors.iter().map(|c| c.contribution.abs()).sum::<f32>() / total_contribution * 100.0
			} else {
				0.0
			};
			lines.push(format!("{} ({:.1}% importance):", category.heading(), weight));
			lines.push(String::new());
			for factor in factors {
				lines.push(self.factor_explanation(factor, destination));
			}
			lines.push(String::new());
		}
		let base_value = details.base_value;
		let total_trips = if self.stats.overall.total_trips > 0 {
			self.stats.overall.total_trips.to_string()
		} else {
			"thousands of".to_owned()
		};
		lines.extend(vec![
			"How this prediction was made:".to_owned(),
			String::new(),
			"SHAP (SHapley Additive exPlanations) Analysis:".to_owned(),
			format!(
				"• Our AI model analyzed {} key features from your travel profile",
				contributions.len()
			),
			format!(
				"• Each feature was assigned an importance score based on how much it influenced the {} prediction",
				destination
			),
			"• The percentages above represent the actual contribution strength of each category to this specific prediction".to_owned(),
			format!(
				"• SHAP values explain exactly why the model chose {} over {} other destinations",
				destination,
				self.n_classes.saturating_sub(1)
			),
			String::new(),
			"Model Decision Process:".to_owned(),
			format!(
				"• Base probability: {} (random chance across all destinations)",
				percent(base_value, 1)
			),
			format!(
				"• Your profile adjustments: {}",
				percent(probability - base_value, 1)
			),
			format!("• Final confidence: {}", percent(probability, 1)),
			String::new(),
			format!(
				"This explanation is based on real-time analysis of your specific inputs compared to patterns from {} historical trips.",
				total_trips
			),
		]);
		lines.join("\n")
	}

	fn prediction_summary(
		&self,
		destination: &str,
		probability: f32,
		contributions: &[Contribution],
	) -> String {
		let destination_stats = self.stats.destination(destination);
		let popularity = &self.stats.overall.destination_popularity;
		let mut parts = Vec::new();
		if probability > 0.7 {
			parts.push(format!(
				"Your travel profile shows a strong alignment with {} visitors.",
				destination
			));
		} else if probability > 0.4 {
			parts.push(format!(
				"Your preferences indicate {} could be a good match for your next trip.",
				destination
			));
		} else {
			parts.push(format!(
				"While {} wasn't the top match, several factors suggest it could still appeal to you.",
				destination
			));
		}
		if let Some(destination_trips) = popularity.get(destination) {
			let total_trips: usize = popularity.values().sum();
			let popularity_percentage = ratio(*destination_trips, total_trips) * 100.0;
			let n_trips = destination_stats.map(|stats| stats.total_trips).unwrap_or(0);
			if probability > 0.7 {
				if popularity_percentage > 10.0 {
					parts.push(format!(
						"{} is a popular destination in our dataset ({:.1}% of all trips), with patterns that closely match your preferences.",
						destination, popularity_percentage
					));
				}
			} else if probability > 0.4 {
				if n_trips > 0 {
					parts.push(format!(
						"Based on analysis of {} similar trips to {}, several factors align with your profile.",
						n_trips, destination
					));
				}
			} else if n_trips > 0 {
				parts.push(format!(
					"Our analysis of {} trips to {} shows some alignment with your travel style.",
					n_trips, destination
				));
			}
		}
		let top_factor = contributions
			.iter()
			.filter(|c| c.contribution > 0.0)
			.fold(None, |top: Option<&Contribution>, c| match top {
				Some(top) if top.contribution.abs() >= c.contribution.abs() => Some(top),
				_ => Some(c),
			});
		if let Some(top_factor) = top_factor {
			parts.push(factor_insight(top_factor, destination, destination_stats));
		}
		parts.join(" ")
	}

	fn factor_explanation(&self, factor: &Contribution, destination: &str) -> String {
		let feature = factor.feature.replace('_', " ").to_lowercase();
		let value = factor.user_value.as_str();
		let stats = self.stats.destination(destination);
		if factor.contribution > 0.0 {
			positive_factor_explanation(&feature, value, destination, stats)
		} else {
			negative_factor_explanation(&feature, value, destination, stats)
		}
	}
}

/// One sentence on how the strongest positive factor relates to the destination's statistics.
fn factor_insight(
	factor: &Contribution,
	destination: &str,
	stats: Option<&DestinationStats>,
) -> String {
	let feature = factor.feature.to_lowercase();
	match stats {
		Some(stats) if feature.contains("duration") => {
			if stats.avg_duration > 0.0 {
				format!(
					"Your trip length particularly aligns with the {} average of {:.1} days.",
					destination, stats.avg_duration
				)
			} else {
				format!(
					"Your preferred trip length aligns well with typical {} itineraries.",
					destination
				)
			}
		}
		Some(stats) if feature.contains("budget") || feature.contains("cost") => {
			if stats.avg_total_cost > 0.0 {
				format!(
					"Your budget range matches the typical {} trip cost of ${:.0}.",
					destination, stats.avg_total_cost
				)
			} else {
				format!(
					"Your budget range matches the typical spending patterns of {} visitors.",
					destination
				)
			}
		}
		Some(stats) if feature.contains("age") => {
			if stats.age_demographics.avg_age > 0.0 {
				format!(
					"Your age demographic aligns with the typical {} traveler (average age: {:.0}).",
					destination, stats.age_demographics.avg_age
				)
			} else {
				format!(
					"Travelers in your demographic frequently choose {} as their next destination.",
					destination
				)
			}
		}
		_ => format!(
			"Your travel preferences show strong indicators for {} based on historical patterns.",
			destination
		),
	}
}

fn positive_factor_explanation(
	feature: &str,
	value: &str,
	destination: &str,
	stats: Option<&DestinationStats>,
) -> String {
	let stats = match stats {
		Some(stats) => stats,
		None => {
			return format!(
				"Your {} ({}) is a strong indicator for {} based on historical patterns",
				feature, value, destination
			)
		}
	};
	if feature.contains("duration") {
		let average = stats.avg_duration;
		match parse_days(value) {
			Some(days) if average > 0.0 => {
				if (days - average).abs() <= 2.0 {
					format!(
						"Your trip duration of {} matches the average {} trip length ({:.1} days)",
						value, destination, average
					)
				} else {
					format!(
						"Your trip duration of {} is within the typical range for {} (average: {:.1} days)",
						value, destination, average
					)
				}
			}
			_ => format!(
				"Your trip duration of {} aligns with typical {} itineraries",
				value, destination
			),
		}
	} else if feature.contains("budget") || feature.contains("cost") {
		if feature.contains("accommodation") {
			let average = stats.avg_accommodation_cost;
			let (low, high) = stats.accommodation_cost_range;
			match parse_dollars(value) {
				Some(cost) if average > 0.0 => {
					if (cost - average).abs() / average * 100.0 <= 20.0 {
						format!(
							"Your accommodation budget ({}) closely matches the average for {} travelers (${:.0})",
							value, destination, average
						)
					} else {
						format!(
							"Your accommodation budget ({}) is within the typical range for {} (${:.0}-${:.0})",
							value, destination, low, high
						)
					}
				}
				_ => format!(
					"Your accommodation budget ({}) fits well within typical {} spending patterns",
					value, destination
				),
			}
		} else if feature.contains("transportation") {
			let average = stats.avg_transportation_cost;
			match parse_dollars(value) {
				Some(cost) if average > 0.0 => {
					if (cost - average).abs() / average * 100.0 <= 20.0 {
						format!(
							"Your transportation budget ({}) aligns with the average for {} (${:.0})",
							value, destination, average
						)
					} else {
						format!(
							"Your transportation budget ({}) is within the typical range for {} travelers",
							value, destination
						)
					}
				}
				_ => format!(
					"Your transportation budget ({}) aligns with typical {} travel costs",
					value, destination
				),
			}
		} else if stats.avg_total_cost > 0.0 {
			format!(
				"Your total budget fits well within the average {} trip cost (${:.0})",
				destination, stats.avg_total_cost
			)
		} else {
			format!(
				"Your budget fits well within typical {} spending patterns",
				destination
			)
		}
	} else if feature.contains("age") {
		let average = stats.age_demographics.avg_age;
		if average <= 0.0 {
			return format!(
				"Travelers in your age group ({}) frequently choose {}",
				value, destination
			);
		}
		match parse_years(value) {
			Some(age) if (age - average).abs() <= 5.0 => format!(
				"Your age ({}) matches the typical {} traveler (average age: {:.0})",
				value, destination, average
			),
			Some(age) => {
				let group = age_group_of(age);
				match age_group_share(stats, group) {
					Some(share) => format!(
						"Your age group ({}) represents {:.0}% of {} travelers in our data",
						group, share, destination
					),
					None => format!(
						"Travelers in your age group ({}) frequently choose {}",
						value, destination
					),
				}
			}
			None => format!(
				"Your age ({}) aligns with typical {} visitor demographics",
				value, destination
			),
		}
	} else if feature.contains("accommodation") {
		let types = &stats.popular_accommodation_types;
		match types.get(value) {
			Some(count) => format!(
				"Your accommodation choice ({}) is popular in {} ({:.0}% of travelers choose this type)",
				value,
				destination,
				ratio(*count, types.values().sum()) * 100.0
			),
			None => format!(
				"Your accommodation preference ({}) matches available options in {}",
				value, destination
			),
		}
	} else {
		format!(
			"Your {} ({}) is a strong indicator for {} based on historical patterns",
			feature, value, destination
		)
	}
}

fn negative_factor_explanation(
	feature: &str,
	value: &str,
	destination: &str,
	stats: Option<&DestinationStats>,
) -> String {
	let stats = match stats {
		Some(stats) => stats,
		None => return generic_negative_explanation(feature, value, destination),
	};
	if feature.contains("duration") {
		let average = stats.avg_duration;
		match parse_days(value) {
			Some(days) if average > 0.0 => {
				if days < average {
					format!(
						"Your trip length ({}) is shorter than typical {} visits (average: {:.1} days), but shorter trips can still be rewarding",
						value, destination, average
					)
				} else {
					format!(
						"Your trip length ({}) is longer than typical {} visits (average: {:.1} days), allowing for more in-depth exploration",
						value, destination, average
					)
				}
			}
			_ => format!(
				"Your preferred trip length ({}) differs from typical {} visits, but can still work well",
				value, destination
			),
		}
	} else if feature.contains("budget") || feature.contains("cost") {
		if feature.contains("accommodation") {
			let average = stats.avg_accommodation_cost;
			match parse_dollars(value) {
				Some(cost) if average > 0.0 => {
					if cost < average {
						format!(
							"Your accommodation budget ({}) is below the {} average (${:.0}), but budget-friendly options are available",
							value, destination, average
						)
					} else {
						format!(
							"Your accommodation budget ({}) exceeds the {} average (${:.0}), offering premium options",
							value, destination, average
						)
					}
				}
				_ => format!(
					"Your accommodation budget ({}) differs from typical {} spending, but options exist in your range",
					value, destination
				),
			}
		} else if feature.contains("transportation") {
			let average = stats.avg_transportation_cost;
			match parse_dollars(value) {
				Some(cost) if average > 0.0 => {
					if cost < average {
						format!(
							"Your transportation budget ({}) is below the {} average (${:.0}), but economical options exist",
							value, destination, average
						)
					} else {
						format!(
							"Your transportation budget ({}) exceeds typical {} costs (${:.0}), allowing for premium travel options",
							value, destination, average
						)
					}
				}
				_ => format!(
					"Your transportation budget ({}) differs from typical {} costs, but alternatives are available",
					value, destination
				),
			}
		} else if stats.avg_total_cost > 0.0 {
			format!(
				"Your budget differs from the average {} trip cost (${:.0}), but travel options exist for various budgets",
				destination, stats.avg_total_cost
			)
		} else {
			format!(
				"Your budget differs from typical {} spending, but options exist in your range",
				destination
			)
		}
	} else if feature.contains("age") {
		let different_preferences = format!(
			"While {} attracts all age groups, your demographic ({}) shows slightly different typical preferences",
			destination, value
		);
		if stats.age_demographics.avg_age <= 0.0 {
			return different_preferences;
		}
		match parse_years(value) {
			Some(age) => {
				let group = age_group_of(age);
				match age_group_share(stats, group) {
					Some(share) if share < 10.0 => format!(
						"Your age group ({}) represents a smaller portion of {} visitors ({:.0}%), but the destination welcomes all ages",
						group, destination, share
					),
					Some(share) => format!(
						"Your age group ({}) represents {:.0}% of {} travelers, showing diverse appeal",
						group, share, destination
					),
					None => different_preferences,
				}
			}
			None => format!(
				"Your age ({}) differs from the typical {} visitor profile, but the destination suits various demographics",
				value, destination
			),
		}
	} else {
		generic_negative_explanation(feature, value, destination)
	}
}

fn generic_negative_explanation(feature: &str, value: &str, destination: &str) -> String {
	format!(
		"Your {} ({}) doesn't strongly correlate with typical {} visitors, but individual preferences vary and the destination offers diverse experiences",
		feature, value, destination
	)
}

/// The age bracket of `age` as the narrative reports it. Ages beyond the last bracket are counted in it.
fn age_group_of(age: f32) -> &'static str {
	AGE_BRACKETS
		.iter()
		.find(|(upper, _)| age <= *upper)
		.map(|(_, label)| *label)
		.unwrap_or("65+")
}

/// The percentage of the destination's travelers in `group`, if any are.
fn age_group_share(stats: &DestinationStats, group: &str) -> Option<f32> {
	let distribution = &stats.age_demographics.age_distribution;
	let count = *distribution.get(group)?;
	if count == 0 {
		return None;
	}
	Some(ratio(count, distribution.values().sum()) * 100.0)
}

fn parse_days(value: &str) -> Option<f32> {
	value.trim_end_matches(" days").trim().parse().ok()
}

fn parse_years(value: &str) -> Option<f32> {
	value
		.trim_end_matches(" years old")
		.trim_end_matches(" years")
		.trim()
		.parse()
		.ok()
}

fn parse_dollars(value: &str) -> Option<f32> {
	let value: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
	value.trim().parse().ok()
}

fn ratio(count: usize, total: usize) -> f32 {
	if total == 0 {
		0.0
	} else {
		count.to_f32().unwrap() / total.to_f32().unwrap()
	}
}

/// Format a probability as a percentage with `decimals` decimal places.
fn percent(value: f32, decimals: usize) -> String {
	format!("{:.*}%", decimals, value * 100.0)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		explain::ImpactStrength,
		stats::{AgeDemographics, OverallStats},
	};
	use std::collections::BTreeMap;

	fn stats() -> DatasetStats {
		let mut age_distribution = BTreeMap::new();
		age_distribution.insert("26-35".to_owned(), 3);
		age_distribution.insert("36-50".to_owned(), 1);
		let mut popular_accommodation_types = BTreeMap::new();
		popular_accommodation_types.insert("Hotel".to_owned(), 3);
		popular_accommodation_types.insert("Hostel".to_owned(), 1);
		let paris = DestinationStats {
			total_trips: 4,
			avg_duration: 6.5,
			duration_range: (5.0, 8.0),
			avg_accommodation_cost: 1100.0,
			accommodation_cost_range: (800.0, 1400.0),
			avg_transportation_cost: 500.0,
			transportation_cost_range: (300.0, 700.0),
			avg_total_cost: 1600.0,
			popular_accommodation_types,
			age_demographics: AgeDemographics {
				avg_age: 33.0,
				age_range: (27.0, 41.0),
				age_distribution,
			},
			..Default::default()
		};
		let mut destination_popularity = BTreeMap::new();
		destination_popularity.insert("Paris, France".to_owned(), 4);
		destination_popularity.insert("Tokyo, Japan".to_owned(), 6);
		let mut destinations = BTreeMap::new();
		destinations.insert("Paris, France".to_owned(), paris);
		DatasetStats {
			destinations,
			overall: OverallStats {
				total_trips: 10,
				unique_destinations: 2,
				destination_popularity,
			},
		}
	}

	fn contribution(feature: &str, contribution: f32, user_value: &str) -> Contribution {
		Contribution {
			feature: feature.to_owned(),
			contribution,
			user_value: user_value.to_owned(),
			raw_value: serde_json::Value::String(user_value.to_owned()),
			impact_strength: ImpactStrength::of(contribution),
		}
	}

	#[test]
	fn test_explain() {
		let stats = stats();
		let narrator = Narrator::new(&stats, 2);
		let details = ShapDetails {
			final_probability: 0.8,
			base_value: 0.5,
			contributions: vec![
				contribution("Duration (days)", 0.3, "7 days"),
				contribution("Accommodation cost", 0.1, "$1,200"),
				contribution("Age", -0.1, "45 years old"),
			],
			feature_impacts: BTreeMap::new(),
		};
		insta::assert_snapshot!(narrator.explain("Paris, France", Some(&details)), @r###"
  Predicted Next Travel Destination: Paris, France
  Confidence: 80%
  Why this prediction was made:
  Your travel profile shows a strong alignment with Paris, France visitors. Paris, France is a popular destination in our dataset (40.0% of all trips), with patterns that closely match your preferences. Your trip length particularly aligns with the Paris, France average of 6.5 days.

  Key factors influencing this prediction:
  Travel Pattern Analysis (80.0% importance):

  Your trip duration of 7 days matches the average Paris, France trip length (6.5 days)
  Your accommodation budget ($1,200) closely matches the average for Paris, France travelers ($1100)

  Demographic Factors (20.0% importance):

  Your age group (36-50) represents 25% of Paris, France travelers, showing diverse appeal

  How this prediction was made:

  SHAP (SHapley Additive exPlanations) Analysis:
  • Our AI model analyzed 3 key features from your travel profile
  • Each feature was assigned an importance score based on how much it influenced the Paris, France prediction
  • The percentages above represent the actual contribution strength of each category to this specific prediction
  • SHAP values explain exactly why the model chose Paris, France over 1 other destinations

  Model Decision Process:
  • Base probability: 50.0% (random chance across all destinations)
  • Your profile adjustments: 30.0%
  • Final confidence: 80.0%

  This explanation is based on real-time analysis of your specific inputs compared to patterns from 10 historical trips.
  "###);
	}

	#[test]
	fn test_factor_explanations() {
		let stats = stats();
		let paris = stats.destination("Paris, France");
		assert_eq!(
			positive_factor_explanation("duration (days)", "12 days", "Paris, France", paris),
			"Your trip duration of 12 days is within the typical range for Paris, France (average: 6.5 days)"
		);
		assert_eq!(
			positive_factor_explanation("accommodation cost", "$2,000", "Paris, France", paris),
			"Your accommodation budget ($2,000) is within the typical range for Paris, France ($800-$1400)"
		);
		assert_eq!(
			positive_factor_explanation("accommodation type", "Hotel", "Paris, France", paris),
			"Your accommodation choice (Hotel) is popular in Paris, France (75% of travelers choose this type)"
		);
		assert_eq!(
			positive_factor_explanation("age group", "26-35", "Paris, France", paris),
			"Your age (26-35) aligns with typical Paris, France visitor demographics"
		);
		assert_eq!(
			negative_factor_explanation("transportation cost", "$300", "Paris, France", paris),
			"Your transportation budget ($300) is below the Paris, France average ($500), but economical options exist"
		);
		assert_eq!(
			negative_factor_explanation("age", "70 years old", "Paris, France", paris),
			"While Paris, France attracts all age groups, your demographic (70 years old) shows slightly different typical preferences"
		);
		assert_eq!(
			negative_factor_explanation("traveler gender", "Male", "Tokyo, Japan", None),
			"Your traveler gender (Male) doesn't strongly correlate with typical Tokyo, Japan visitors, but individual preferences vary and the destination offers diverse experiences"
		);
	}

	#[test]
	fn test_fallback() {
		let stats = DatasetStats::default();
		let narrator = Narrator::new(&stats, 3);
		let explanation = narrator.explain("Bali, Indonesia", None);
		assert!(explanation.starts_with("🎯 **Bali, Indonesia** appears"));
		assert!(explanation.contains("tropical paradise setting"));
		assert_eq!(
			destination_insight("Reykjavik, Iceland"),
			"its unique cultural attractions and travel experiences"
		);
		assert_eq!(
			destination_insight("New York, USA"),
			"its fast-paced energy, Broadway shows, and diverse neighborhoods"
		);
	}

	#[test]
	fn test_confidence_explanation() {
		assert!(confidence_explanation(0.71).starts_with("The high confidence"));
		assert!(confidence_explanation(0.5).starts_with("The moderate confidence"));
		assert!(confidence_explanation(0.3).starts_with("The lower confidence"));
		assert!(confidence_explanation(0.1).starts_with("The low confidence"));
	}
}
